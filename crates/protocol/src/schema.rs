//! Protocol-buffer messages of the Mercury sub-protocol
//! (`spotify.mercury.proto`).

#[derive(Clone, PartialEq, prost::Message)]
pub struct UserField {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// Request header.  Replies reuse this layout for their header, which is
/// where `status_code` is read from.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MercuryRequest {
    #[prost(string, tag = "1")]
    pub uri: String,
    #[prost(string, tag = "2")]
    pub content_type: String,
    #[prost(bytes = "vec", tag = "3")]
    pub method: Vec<u8>,
    #[prost(sint32, tag = "4")]
    pub status_code: i32,
    #[prost(string, tag = "5")]
    pub source: String,
    #[prost(message, repeated, tag = "6")]
    pub user_fields: Vec<UserField>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MercuryReply {
    #[prost(sint32, tag = "1")]
    pub status_code: i32,
    #[prost(string, tag = "2")]
    pub status_message: String,
    /// One of [`cache_policy`] values.
    #[prost(int32, tag = "3")]
    pub cache_policy: i32,
    #[prost(sint32, tag = "4")]
    pub ttl: i32,
    #[prost(bytes = "vec", tag = "5")]
    pub etag: Vec<u8>,
    #[prost(string, tag = "6")]
    pub content_type: String,
    #[prost(bytes = "vec", tag = "7")]
    pub body: Vec<u8>,
}

pub mod cache_policy {
    pub const CACHE_NO: i32 = 1;
    pub const CACHE_PRIVATE: i32 = 2;
    pub const CACHE_PUBLIC: i32 = 3;
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MercuryMultiGetRequest {
    #[prost(message, repeated, tag = "1")]
    pub request: Vec<MercuryRequest>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MercuryMultiGetReply {
    #[prost(message, repeated, tag = "1")]
    pub reply: Vec<MercuryReply>,
}
