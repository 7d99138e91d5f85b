//! Content extractors
//!
//! This module turns fetched markup into record fields:
//! - Email addresses (multi-source discovery, junk filter, ranking)
//! - Phone numbers (`tel:` links and text scan, NANP normalization)
//! - Social profile links
//! - Platform and analytics signatures
//! - Contact link and about excerpt

pub mod email;
pub mod page;
pub mod phone;
pub mod signatures;
pub mod social;

// Re-export main types and functions
pub use email::{decode_cfemail, extract_emails, is_junk_email, rank_emails};
pub use page::{ExtractError, PageExtract};
pub use phone::{clean_phone, scan_phones, tel_links};
pub use signatures::{looks_like_age_gate, Signatures};
pub use social::Socials;
