// Sanctions module - member status derivation from provvedimenti

pub mod engine;
pub mod memory;
pub mod policy;
pub mod postgres;
pub mod store;

pub use engine::{apply_sanction, process_sanction, SanctionError, SanctionInput, SanctionOutcome};
pub use memory::InMemorySanctionStore;
pub use policy::{status_label, MemberCategory, MemberCategoryPolicy, MemberStatus, SanctionType};
pub use postgres::PgSanctionStore;
pub use store::{SanctionChange, SanctionStore, StoreError};
