//! Per-site extraction rules.
//!
//! Rule files are plain text, one `command: value` directive per line, named
//! after the host they apply to (`example.com.txt`, or `.example.com.txt` for
//! every subdomain).

pub mod directives;
pub mod parser;
pub mod repository;

pub use directives::{Directive, SiteConfig};
pub use parser::ConfigParser;
pub use repository::{DEFAULT_FINGERPRINTS, SiteConfigRepository, SiteConfigRepositoryBuilder};
