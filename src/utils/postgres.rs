//! Connection settings shared by the pgvector store and the mart reader.

use sqlx::postgres::PgConnectOptions;
use std::time::Duration;

/// Parse `url` and make the server cancel any statement running longer than
/// `statement_timeout`.
pub fn connect_options(
    url: &str,
    statement_timeout: Duration,
) -> Result<PgConnectOptions, sqlx::Error> {
    let options: PgConnectOptions = url.parse()?;
    let millis = statement_timeout.as_millis().max(1).to_string();
    Ok(options.options([("statement_timeout", millis.as_str())]))
}
