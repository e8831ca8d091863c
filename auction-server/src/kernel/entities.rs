use uuid::Uuid;

/// Identity of an authenticated marketplace user (administrator or dealer).
pub type UserId = Uuid;

/// Opaque reference to a vehicle listing. The listing itself is managed by
/// the marketplace CRUD service; this server only links to it.
pub type VehicleId = Uuid;

/// Monetary amount in minor currency units.
pub type Amount = u64;
