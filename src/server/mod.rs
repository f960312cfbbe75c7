mod router;
mod state;

pub use router::{build_router, CALLER_ID_HEADER};
pub use state::{HealthSnapshot, ServeState};
