//! Capability traits shared by every resource shape

/// A resource as reported by a cloud provider. It has no local identity yet.
pub trait CloudResource {
    fn cloud_id(&self) -> &str;
}

/// A row persisted in the store
pub trait StoreResource {
    /// Local primary key assigned by the store
    fn id(&self) -> &str;

    fn cloud_id(&self) -> &str;
}

/// Implement [`CloudResource`] for types whose cloud id lives in a `cloud_id` field
#[macro_export]
macro_rules! impl_cloud_resource {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::resource::CloudResource for $ty {
                fn cloud_id(&self) -> &str {
                    &self.cloud_id
                }
            }
        )+
    };
}

/// Implement [`StoreResource`] for types with `id` and `cloud_id` fields
#[macro_export]
macro_rules! impl_store_resource {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::resource::StoreResource for $ty {
                fn id(&self) -> &str {
                    &self.id
                }

                fn cloud_id(&self) -> &str {
                    &self.cloud_id
                }
            }
        )+
    };
}
