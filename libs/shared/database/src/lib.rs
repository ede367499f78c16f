pub mod memory;
pub mod postgrest;
pub mod state;
pub mod store;
pub mod supabase;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use state::AppState;
pub use store::{
    BookingRecordStore, HospitalFilter, InventoryStore, PageRequest, SlotPush, StoreError,
    StoreResult, StoreTransaction, TransactionalStore,
};
