use crate::entity::Entity;

/// Recoverable faults a caller can distinguish and react to.
///
/// Contract violations (calling `get<T>` on an entity that doesn't have
/// `T`, using a null handle) are not represented here: they are enforced
/// with `debug_assert!` in debug builds and are left unchecked in release
/// builds, matching the assert-in-debug / UB-in-release contract this
/// registry follows. Exceeding a sparse set's fixed capacity, by contrast,
/// *is* one of the variants below — `insert` returns it as a `Result`
/// rather than asserting, per spec §4.2's "exceeding caps fails with
/// `CapacityExceeded`".
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SecsError {
    /// The entity was never created, or has already been destroyed.
    #[error("operation on invalid entity: {0}")]
    InvalidEntity(Entity),

    /// `emplace` was called for a component type the entity already has.
    #[error("entity {entity} already has a component of this type")]
    DuplicateComponent { entity: Entity },

    /// A sparse set or id generator reached its fixed capacity.
    #[error("capacity exceeded: {what} is limited to {limit} entries")]
    CapacityExceeded { what: &'static str, limit: usize },
}

pub type Result<T> = std::result::Result<T, SecsError>;
