//! Lazy metadata loading for catalogue resources.
//!
//! A [`Loadable`] fetches its own metadata once.  A [`LoadGroup`] loads all
//! of its pending members together: one member goes out as a plain request,
//! several go out as a single multi-get, and an empty group does nothing.

use async_trait::async_trait;
use prost::Message;

use sw_domain::Result;
use sw_protocol::{MercuryRequest, ResourceId};

/// Where metadata comes from.  Implemented by [`Session`](crate::Session).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch<M: Message + Default + 'static>(&self, request: MercuryRequest) -> Result<M>;

    /// Fetch one `M` per request in a single round trip; results line up
    /// with `requests`.
    async fn fetch_batch<M: Message + Default + 'static>(
        &self,
        uri: String,
        requests: Vec<MercuryRequest>,
    ) -> Result<Vec<M>>;
}

/// A catalogue entity whose metadata lives under `hm://metadata/<kind>/`.
pub trait Resource: Send {
    /// Singular kind, e.g. `"track"`.
    const KIND: &'static str;
    /// Kinds without server-side metadata are loaded without any I/O.
    const HAS_METADATA: bool = true;

    type Metadata: Message + Default + 'static;

    fn id(&self) -> ResourceId;

    fn apply_metadata(&mut self, metadata: Self::Metadata);

    fn metadata_uri(&self) -> String {
        format!("hm://metadata/{}/{}", Self::KIND, self.id().to_hex())
    }
}

/// Multi-get URI for resources of kind `R`.
pub fn collection_uri<R: Resource>() -> String {
    format!("hm://metadata/{}s", R::KIND)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Pending,
    Loaded,
}

/// A resource together with whether its metadata has been applied.
#[derive(Debug, Clone)]
pub struct Loadable<R> {
    resource: R,
    state: LoadState,
}

impl<R: Resource> Loadable<R> {
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            state: LoadState::Pending,
        }
    }

    /// Wrap a resource whose metadata is already known.
    pub fn loaded(resource: R) -> Self {
        Self {
            resource,
            state: LoadState::Loaded,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn into_inner(self) -> R {
        self.resource
    }

    /// Fetch and apply metadata unless already loaded.  On error the
    /// resource stays pending.
    pub async fn load<S: MetadataSource>(&mut self, source: &S) -> Result<&R> {
        if !self.is_loaded() {
            if R::HAS_METADATA {
                let request = MercuryRequest::new(self.resource.metadata_uri());
                let metadata = source.fetch::<R::Metadata>(request).await?;
                self.resource.apply_metadata(metadata);
            }
            self.state = LoadState::Loaded;
        }
        Ok(&self.resource)
    }

    fn apply(&mut self, metadata: R::Metadata) {
        self.resource.apply_metadata(metadata);
        self.state = LoadState::Loaded;
    }
}

/// Resources of one kind loaded together.
#[derive(Debug, Clone)]
pub struct LoadGroup<R> {
    members: Vec<Loadable<R>>,
}

impl<R: Resource> LoadGroup<R> {
    pub fn new(resources: impl IntoIterator<Item = R>) -> Self {
        Self {
            members: resources.into_iter().map(Loadable::new).collect(),
        }
    }

    pub fn from_members(members: Vec<Loadable<R>>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Loaded once every member is; an empty group is always loaded.
    pub fn state(&self) -> LoadState {
        if self.members.iter().all(Loadable::is_loaded) {
            LoadState::Loaded
        } else {
            LoadState::Pending
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }

    pub fn members(&self) -> &[Loadable<R>] {
        &self.members
    }

    pub fn resources(&self) -> impl Iterator<Item = &R> {
        self.members.iter().map(Loadable::resource)
    }

    pub fn into_resources(self) -> Vec<R> {
        self.members.into_iter().map(Loadable::into_inner).collect()
    }

    /// Load every pending member in one round trip.
    ///
    /// Members already loaded are left out of the request.  If the round
    /// trip fails, no member changes state.
    pub async fn load<S: MetadataSource>(&mut self, source: &S) -> Result<()> {
        let pending: Vec<usize> = self
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_loaded())
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }
        if !R::HAS_METADATA {
            for &i in &pending {
                self.members[i].state = LoadState::Loaded;
            }
            return Ok(());
        }

        if let [only] = pending[..] {
            self.members[only].load(source).await?;
            return Ok(());
        }

        let requests: Vec<MercuryRequest> = pending
            .iter()
            .map(|&i| MercuryRequest::new(self.members[i].resource.metadata_uri()))
            .collect();
        tracing::debug!(kind = R::KIND, count = requests.len(), "loading metadata group");

        let results = source
            .fetch_batch::<R::Metadata>(collection_uri::<R>(), requests)
            .await?;
        for (i, metadata) in pending.into_iter().zip(results) {
            self.members[i].apply(metadata);
        }
        Ok(())
    }

    /// Load member `index`, which loads the whole group.
    pub async fn load_member<S: MetadataSource>(
        &mut self,
        index: usize,
        source: &S,
    ) -> Result<Option<&R>> {
        if index >= self.members.len() {
            return Ok(None);
        }
        self.load(source).await?;
        Ok(self.members.get(index).map(Loadable::resource))
    }
}
