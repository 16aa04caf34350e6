//! Slash-delimited path helpers.
//!
//! Paths address nodes in a [`Tree`](crate::model::Tree). Leading empty
//! segments are significant: an empty segment means "jump to the root", so
//! `"/a/b"` splits into `["", "a", "b"]` while `"a//b"` splits into
//! `["a", "b"]`.

/// Split `path` into segments.
///
/// Leading empty tokens are preserved, every other empty token is dropped.
///
/// ```
/// use webact::paths::split;
///
/// assert_eq!(split("/a/b"), vec!["", "a", "b"]);
/// assert_eq!(split("a//b/"), vec!["a", "b"]);
/// assert_eq!(split("/"), vec!["", ""]);
/// ```
pub fn split(path: &str) -> Vec<&str> {
    let mut tokens = path.split('/').peekable();
    let mut result = Vec::new();
    while let Some(token) = tokens.next_if(|token| token.is_empty()) {
        result.push(token);
    }
    result.extend(tokens.filter(|token| !token.is_empty()));
    result
}

/// Join path fragments with `/`.
///
/// A fragment equal to `"/"` contributes the root marker, so joining
/// `["/", "a", "b"]` yields `"/a/b"`. The result is normalized.
///
/// ```
/// use webact::paths::join;
///
/// assert_eq!(join(["/", "a", "b"]), "/a/b");
/// assert_eq!(join(["a/", "/b"]), "a/b");
/// ```
pub fn join<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut segments: Vec<String> = Vec::new();
    for fragment in fragments {
        let fragment = match fragment.as_ref() {
            "/" => "",
            other => other,
        };
        segments.extend(split(fragment).into_iter().map(str::to_string));
    }
    normalize(&segments.join("/"))
}

/// Collapse repeated and trailing separators.
///
/// ```
/// use webact::paths::normalize;
///
/// assert_eq!(normalize("/a//b/"), "/a/b");
/// ```
pub fn normalize(path: &str) -> String {
    split(path).join("/")
}

/// Whether `path` starts at the root.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}
