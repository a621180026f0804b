use std::fmt;
use url::form_urlencoded;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Signup,
    Verify {
        phone: String,
        name: Option<String>,
        signup: bool,
    },
    Dashboard,
    Chat {
        id: Uuid,
    },
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        let path = path.trim_end_matches('/');

        match path {
            "" => Some(Self::Landing),
            "/auth/login" => Some(Self::Login),
            "/auth/signup" => Some(Self::Signup),
            "/auth/verify" => {
                let mut phone = String::new();
                let mut name = None;
                let mut signup = false;
                for (key, value) in form_urlencoded::parse(query.as_bytes()) {
                    match key.as_ref() {
                        "phone" => phone = value.into_owned(),
                        "name" if !value.is_empty() => name = Some(value.into_owned()),
                        "signup" => signup = value == "true",
                        _ => {}
                    }
                }
                Some(Self::Verify {
                    phone,
                    name,
                    signup,
                })
            }
            "/dashboard" => Some(Self::Dashboard),
            _ => {
                let id = path.strip_prefix("/chat/")?;
                Uuid::parse_str(id).ok().map(|id| Self::Chat { id })
            }
        }
    }

    pub fn to_path(&self) -> String {
        match self {
            Self::Landing => "/".to_string(),
            Self::Login => "/auth/login".to_string(),
            Self::Signup => "/auth/signup".to_string(),
            Self::Verify {
                phone,
                name,
                signup,
            } => {
                let mut query = form_urlencoded::Serializer::new(String::new());
                query.append_pair("phone", phone);
                if let Some(name) = name {
                    query.append_pair("name", name);
                }
                if *signup {
                    query.append_pair("signup", "true");
                }
                format!("/auth/verify?{}", query.finish())
            }
            Self::Dashboard => "/dashboard".to_string(),
            Self::Chat { id } => format!("/chat/{}", id),
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Dashboard | Self::Chat { .. })
    }

    /// Sends anonymous visitors of protected pages back to the landing page.
    pub fn guard(self, authenticated: bool) -> Self {
        if self.requires_auth() && !authenticated {
            Self::Landing
        } else {
            self
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_query_is_encoded() {
        let route = Route::Verify {
            phone: "+15551234567".into(),
            name: Some("Ada Lovelace".into()),
            signup: true,
        };
        let path = route.to_path();
        assert_eq!(
            path,
            "/auth/verify?phone=%2B15551234567&name=Ada+Lovelace&signup=true"
        );
        assert_eq!(Route::parse(&path), Some(route));
    }

    #[test]
    fn login_verify_has_no_name() {
        let route = Route::parse("/auth/verify?phone=%2B447700900123").unwrap();
        assert_eq!(
            route,
            Route::Verify {
                phone: "+447700900123".into(),
                name: None,
                signup: false,
            }
        );
    }

    #[test]
    fn parses_static_and_chat_routes() {
        let id = Uuid::new_v4();
        assert_eq!(Route::parse("/"), Some(Route::Landing));
        assert_eq!(Route::parse("/dashboard/"), Some(Route::Dashboard));
        assert_eq!(
            Route::parse(&format!("/chat/{}", id)),
            Some(Route::Chat { id })
        );
        assert_eq!(Route::parse("/chat/not-a-uuid"), None);
        assert_eq!(Route::parse("/settings"), None);
    }

    #[test]
    fn protected_routes_redirect_when_logged_out() {
        let chat = Route::Chat { id: Uuid::new_v4() };
        assert_eq!(Route::Dashboard.guard(false), Route::Landing);
        assert_eq!(chat.clone().guard(false), Route::Landing);
        assert_eq!(chat.clone().guard(true), chat);
        assert_eq!(Route::Login.guard(false), Route::Login);
    }
}
