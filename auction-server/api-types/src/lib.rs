use {
    ::serde::{
        Deserialize,
        Serialize,
    },
    utoipa::{
        ToResponse,
        ToSchema,
    },
    uuid::Uuid,
};

pub mod auction;
pub mod serde;
pub mod ws;

/// Identity of an authenticated marketplace user (administrator or dealer).
pub type UserId = Uuid;
/// Opaque reference to a vehicle listing managed outside this service.
pub type VehicleId = Uuid;
/// Monetary amount in minor currency units.
pub type Amount = u64;

#[derive(ToResponse, ToSchema, Serialize, Deserialize)]
#[response(description = "An error occurred processing the request")]
pub struct ErrorBodyResponse {
    pub error: String,
}
