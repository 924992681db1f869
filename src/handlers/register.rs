//! `/users/register` — no auth route flag, but requires a client
//! certificate on the connection itself. The certificate's CN seeds the
//! default username; a taken name re-prompts with Gemini status `10`
//! rather than failing outright, matching the wire protocol's
//! input-prompt convention.

use std::sync::Arc;

use x509_parser::prelude::*;

use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::models::Actor;
use crate::server::{Conn, Handler};

use super::is_valid_username;

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let Some(der) = req.peer_cert_der.as_deref() else {
        return writer.redirect("/users").await.map_err(AppError::from);
    };
    let fingerprint = req
        .peer_fingerprint
        .clone()
        .expect("fingerprint is computed alongside the DER bytes");

    if Actor::find_by_fingerprint(&handler.db, &fingerprint)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        .is_some()
    {
        return writer.redirect("/users").await.map_err(AppError::from);
    }

    let query = req.query_decoded();
    let requested = if query.is_empty() {
        common_name(der).unwrap_or_else(|| "user".to_string())
    } else {
        query
    };

    if !is_valid_username(&requested) {
        writer.status(10, "Invalid user name, enter user name").await?;
        return Ok(());
    }

    if Actor::find_by_preferred_username(&handler.db, &handler.domain, &requested)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?
        .is_some()
    {
        writer
            .statusf(10, format_args!("{requested} is already taken, enter user name"))
            .await?;
        return Ok(());
    }

    let mut tx = handler
        .db
        .begin()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    Actor::register(&mut tx, &handler.config, &requested, &fingerprint)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    writer.redirect("/users").await.map_err(AppError::from)
}

/// Reads the certificate's Subject Common Name, used to default the
/// username a connecting client hasn't chosen one for yet.
fn common_name(der: &[u8]) -> Option<String> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_name_returns_none_for_garbage_bytes() {
        assert_eq!(common_name(b"not a certificate"), None);
    }
}
