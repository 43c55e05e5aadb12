pub mod classify_hit;
pub mod classify_hits;
pub mod classify_stats;

pub use classify_hit::{classify_hit, taxon_id_of};
pub use classify_hits::{classify_hits, JoinStats};
pub use classify_stats::{compute_abundance, normalize_species, AbundanceTable, UnknownPolicy};
