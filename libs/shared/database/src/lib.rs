pub mod error;
pub mod supabase;

pub use error::{DbError, StoreError};
pub use supabase::SupabaseClient;
