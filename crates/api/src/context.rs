use flagplane_auth::IdToken;

use crate::status::Locale;

/// Per-request caller context.
///
/// The transport layer decodes and verifies the token signature; services
/// only see the resulting claims (or their absence).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestContext {
    id_token: Option<IdToken>,
    locale: Locale,
}

impl RequestContext {
    pub fn anonymous(locale: Locale) -> Self {
        Self {
            id_token: None,
            locale,
        }
    }

    pub fn authenticated(id_token: IdToken, locale: Locale) -> Self {
        Self {
            id_token: Some(id_token),
            locale,
        }
    }

    pub fn id_token(&self) -> Option<&IdToken> {
        self.id_token.as_ref()
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }
}
