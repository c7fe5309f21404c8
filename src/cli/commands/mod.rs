mod config;
mod run;
mod status;

pub use config::ConfigCommand;
pub use run::RunArgs;

pub use config::handle_config;
pub use run::handle_run;
pub use status::handle_status;

use regex::Regex;
use std::sync::LazyLock;

static URL_PASSWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<head>[a-zA-Z][a-zA-Z0-9+.-]*://[^:/@]+):[^@/]*@").unwrap());

/// Hide the password of a connection URL before printing it.
pub(crate) fn redact_url(url: &str) -> String {
    URL_PASSWORD.replace(url, "$head:********@").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgresql://indexer:s3cret@db:5432/mart"),
            "postgresql://indexer:********@db:5432/mart"
        );
        assert_eq!(redact_url("http://localhost:6334"), "http://localhost:6334");
        assert_eq!(
            redact_url("postgresql://indexer@db/mart"),
            "postgresql://indexer@db/mart"
        );
    }
}
