pub mod site_emails;

pub use site_emails::{candidate_urls, extract_emails, SiteEmailFinder};
