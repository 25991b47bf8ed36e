// Connection builder: turns a subdomain or full URL plus credentials into
// the base API URL and Basic `Authorization` header used by `ApiClient`.

use crate::cache::Cache;
use crate::error::ZatError;
use crate::ui::Prompter;
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;

/// Template for hosted accounts; `{}` is replaced with the subdomain.
pub const DEFAULT_URL_TEMPLATE: &str = "https://{}.zendesk.com/";

pub static SUBDOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9][a-z0-9\-]+[a-z0-9]$").expect("subdomain pattern compiles")
});

/// Accepts hosted URLs as well as host-mapped domains, with optional port
/// and path.
pub static FULL_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(https?)://[a-z0-9]+(([.]|[-]{1,2})[a-z0-9]+)*\.([a-z]{2,16}|[0-9]{1,3})((:[0-9]{1,5})?(/?|/.*))?$",
    )
    .expect("url pattern compiles")
});

/// An email address, optionally suffixed with `/token` for API-token auth.
pub static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s/]+(/token)?$").expect("email pattern compiles"));

pub fn valid_subdomain(input: &str) -> bool {
    SUBDOMAIN_PATTERN.is_match(input)
}

pub fn valid_full_url(input: &str) -> bool {
    FULL_URL_PATTERN.is_match(input)
}

/// Base URL (always ending in `/`) for a subdomain or full URL.
pub fn full_url(input: &str) -> Result<String, ZatError> {
    let input = input.trim();
    if valid_full_url(input) {
        if input.ends_with('/') {
            Ok(input.to_string())
        } else {
            Ok(format!("{}/", input))
        }
    } else if valid_subdomain(input) {
        Ok(DEFAULT_URL_TEMPLATE.replace("{}", input))
    } else {
        Err(ZatError::InvalidUrl)
    }
}

pub fn validate_username(username: &str) -> Result<(), ZatError> {
    if EMAIL_PATTERN.is_match(username) {
        Ok(())
    } else {
        Err(ZatError::InvalidEmail)
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn authorization_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct AuthInput {
    pub subdomain: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Everything needed to talk to one account.
#[derive(Debug, Clone)]
pub struct Connection {
    pub subdomain: String,
    pub base_url: String,
    pub credentials: Credentials,
}

/// Resolve subdomain, username and password (flag, then cache, then
/// prompt), validating each as soon as it is known. Subdomain and username
/// are remembered in the local cache; the password never is.
pub fn prepare_api_auth(
    input: &AuthInput,
    cache: &Cache,
    prompter: &dyn Prompter,
) -> Result<Connection> {
    let subdomain = match &input.subdomain {
        Some(s) => s.clone(),
        None => match cache.fetch("subdomain", None)? {
            Some(s) => s,
            None => prompter.input(
                "Enter your Zendesk subdomain or full URL (including protocol):",
                None,
            )?,
        },
    };
    let subdomain = subdomain.trim().to_string();
    let base_url = full_url(&subdomain)?;

    let username = match &input.username {
        Some(u) => u.clone(),
        None => match cache.fetch("username", Some(subdomain.as_str()))? {
            Some(u) => u,
            None => prompter.input("Enter your username:", None)?,
        },
    };
    let username = username.trim().to_string();
    validate_username(&username)?;

    let password = match &input.password {
        Some(p) => p.clone(),
        None => match cache.fetch("password", Some(subdomain.as_str()))? {
            Some(p) => p,
            None => prompter.secret("Enter your password:")?,
        },
    };

    cache.save(&[("subdomain", subdomain.as_str()), ("username", username.as_str())])?;
    log::debug!("using {} as {}", base_url, username);

    Ok(Connection {
        subdomain,
        base_url,
        credentials: Credentials { username, password },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::testing::ScriptedPrompter;
    use tempfile::TempDir;

    fn local_cache(dir: &TempDir) -> Cache {
        Cache::with_paths(dir.path().join(".zat"), None)
    }

    #[test]
    fn template_substitutes_subdomain() {
        assert_eq!(full_url("my-subdomain").unwrap(), "https://my-subdomain.zendesk.com/");
    }

    #[test]
    fn rejects_bad_subdomains() {
        for bad in ["sub.domain", "sub!domain", "sub~domain", "sub_domain"] {
            assert!(!valid_subdomain(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn accepts_good_subdomains() {
        for good in ["subDomain", "SUBDOMAIN", "subdomain", "sub-domain"] {
            assert!(valid_subdomain(good), "{good} should be accepted");
        }
    }

    #[test]
    fn full_url_requires_protocol() {
        assert!(!valid_full_url("www.subdomain.com"));
        assert!(!valid_full_url("subdomain.com"));
    }

    #[test]
    fn accepts_hosted_and_host_mapped_urls() {
        for good in [
            "http://z3n-subdomain.zendesk.com",
            "https://subdomain.zendesk.com",
            "https://my-subdomain.zendesk-staging.com",
            "https://subdomain.com",
            "https://www.subdomain.com",
            "https://subdomain.au",
            "http://127.0.0.1:4567",
        ] {
            assert!(valid_full_url(good), "{good} should be accepted");
        }
    }

    #[test]
    fn full_url_gets_trailing_slash() {
        assert_eq!(
            full_url("https://acme.zendesk.com").unwrap(),
            "https://acme.zendesk.com/"
        );
        assert!(matches!(full_url("www.keith.com"), Err(ZatError::InvalidUrl)));
    }

    #[test]
    fn usernames_must_be_emails() {
        assert!(validate_username("agent@example.com").is_ok());
        assert!(validate_username("agent@example.com/token").is_ok());
        assert!(matches!(validate_username("bad-email"), Err(ZatError::InvalidEmail)));
    }

    #[test]
    fn basic_auth_header() {
        let credentials = Credentials {
            username: "username@something.com".into(),
            password: "password".into(),
        };
        assert_eq!(
            credentials.authorization_header(),
            "Basic dXNlcm5hbWVAc29tZXRoaW5nLmNvbTpwYXNzd29yZA=="
        );
    }

    #[test]
    fn invalid_subdomain_fails_before_asking_for_username() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::new(&[]);
        let input = AuthInput {
            subdomain: Some("bad!subdomain".into()),
            ..Default::default()
        };
        let err = prepare_api_auth(&input, &local_cache(&dir), &prompter).unwrap_err();
        assert!(matches!(err.downcast_ref::<ZatError>(), Some(ZatError::InvalidUrl)));
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn invalid_email_is_rejected() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::new(&[]);
        let input = AuthInput {
            subdomain: Some("subdomain".into()),
            username: Some("bad-email".into()),
            ..Default::default()
        };
        let err = prepare_api_auth(&input, &local_cache(&dir), &prompter).unwrap_err();
        assert!(matches!(err.downcast_ref::<ZatError>(), Some(ZatError::InvalidEmail)));
    }

    #[test]
    fn prompts_for_missing_values_and_caches_all_but_password() {
        let dir = TempDir::new().unwrap();
        let cache = local_cache(&dir);
        let prompter = ScriptedPrompter::new(&["acme", "agent@acme.com", "secret"]);

        let connection = prepare_api_auth(&AuthInput::default(), &cache, &prompter).unwrap();
        assert_eq!(connection.base_url, "https://acme.zendesk.com/");
        assert_eq!(connection.credentials.password, "secret");

        assert_eq!(cache.fetch("subdomain", None).unwrap().as_deref(), Some("acme"));
        assert_eq!(
            cache.fetch("username", None).unwrap().as_deref(),
            Some("agent@acme.com")
        );
        assert_eq!(cache.fetch("password", None).unwrap(), None);
    }

    #[test]
    fn cached_values_skip_prompts() {
        let dir = TempDir::new().unwrap();
        let cache = local_cache(&dir);
        cache
            .save(&[("subdomain", "acme"), ("username", "agent@acme.com")])
            .unwrap();
        let prompter = ScriptedPrompter::new(&["secret"]);

        let connection = prepare_api_auth(&AuthInput::default(), &cache, &prompter).unwrap();
        assert_eq!(connection.subdomain, "acme");
        assert_eq!(*prompter.asked.borrow(), vec!["Enter your password:".to_string()]);
    }
}
