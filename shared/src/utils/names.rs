//! Function-name shortening for compact display

use once_cell::sync::Lazy;
use regex::Regex;

static CPP_ANONYMOUS_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(anonymous namespace\)::").expect("valid regex"));

static GO_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)/v(?:[2-9]|[1-9][0-9]+)([./].*)$").expect("valid regex")
});

static GO_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[\w\-\.]+/)+([^.]+\..+)").expect("valid regex"));

static JAVA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z]\w*\.)*([A-Z][\w$]*\.(?:<init>|[a-z][\w$]*(?:\$\d+)?))(?:\(|$)")
        .expect("valid regex")
});

static CPP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[_a-zA-Z]\w*::)+(_*[A-Z]\w*::~?[_a-zA-Z]\w*(?:<.*>)?)")
        .expect("valid regex")
});

/// Shorten a fully qualified function name to the part a reader needs:
/// package paths, Java packages and C++/Rust namespaces are dropped while
/// the type and method are kept.
///
/// Names that match no known pattern are returned unchanged.
pub fn shorten_function_name(name: &str) -> String {
    let name = CPP_ANONYMOUS_PREFIX.replace(name, "");
    let name = GO_VERSION.replace(&name, "${1}${2}");
    for re in [&*GO_PATH, &*JAVA, &*CPP] {
        if let Some(caps) = re.captures(&name) {
            return caps
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .collect();
        }
    }
    name.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_package_path() {
        assert_eq!(
            shorten_function_name("github.com/acme/server.(*Handler).ServeHTTP"),
            "server.(*Handler).ServeHTTP"
        );
        assert_eq!(
            shorten_function_name("github.com/acme/lib/v2.Decode"),
            "lib.Decode"
        );
    }

    #[test]
    fn test_java() {
        assert_eq!(
            shorten_function_name("com.example.util.Parser.parse"),
            "Parser.parse"
        );
        assert_eq!(
            shorten_function_name("com.example.Parser.<init>(Parser.java:12)"),
            "Parser.<init>"
        );
    }

    #[test]
    fn test_cpp_and_rust_paths() {
        assert_eq!(shorten_function_name("ns::inner::Widget::draw"), "Widget::draw");
        assert_eq!(
            shorten_function_name("(anonymous namespace)::Widget::draw"),
            "Widget::draw"
        );
        assert_eq!(
            shorten_function_name("sightline_render::engine::StackEngine::build"),
            "StackEngine::build"
        );
    }

    #[test]
    fn test_unmatched_names_unchanged() {
        assert_eq!(shorten_function_name("main"), "main");
        assert_eq!(shorten_function_name("std::vector::push_back"), "std::vector::push_back");
        assert_eq!(shorten_function_name("0x4005d0"), "0x4005d0");
    }
}
