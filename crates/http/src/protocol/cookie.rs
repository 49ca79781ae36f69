use http::{HeaderMap, header};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    name: String,
    value: String,
    touched: bool,
}

/// Cookies sent by the client plus the ones set while handling the request.
///
/// Only cookies changed through [`CookieJar::set`] or [`CookieJar::remove`]
/// are sent back as `Set-Cookie` lines.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookies = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                (!name.is_empty()).then(|| Cookie { name: name.to_string(), value: value.trim().to_string(), touched: false })
            })
            .collect();

        Self { cookies }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.iter().rev().find(|cookie| cookie.name == name).map(|cookie| cookie.value.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.cookies.iter_mut().find(|cookie| cookie.name == name) {
            Some(cookie) => {
                cookie.value = value;
                cookie.touched = true;
            }
            None => self.cookies.push(Cookie { name, value, touched: true }),
        }
    }

    /// Clears a cookie on the client by setting it empty.
    pub fn remove(&mut self, name: &str) {
        self.set(name, "");
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// `Set-Cookie` values for every cookie changed during the request.
    pub fn set_cookie_values(&self) -> impl Iterator<Item = String> + '_ {
        self.cookies.iter().filter(|cookie| cookie.touched).map(|cookie| {
            if cookie.value.is_empty() {
                format!("{}=; Max-Age=0", cookie.name)
            } else {
                format!("{}={}", cookie.name, cookie.value)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_parse_and_set() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("session=abc; theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("lang=en"));

        let mut jar = CookieJar::from_headers(&headers);
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("theme"), Some("dark"));
        assert_eq!(jar.set_cookie_values().count(), 0);

        jar.set("theme", "light");
        jar.set("new", "1");
        jar.remove("session");

        let values: Vec<_> = jar.set_cookie_values().collect();
        assert_eq!(values, vec!["session=; Max-Age=0", "theme=light", "new=1"]);
    }
}
