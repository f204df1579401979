//! Handler lookup over parsed Rust sources.
//!
//! Sources are parsed with `syn` and every free function and inherent/trait method is
//! recorded under its qualified path together with its doc comment. Handler references from
//! the route manifest (`handlers::users::show`, `UserController::show`, `show`) resolve by
//! matching the trailing path segments.

use crate::route::HandlerResolver;
use crate::scanner::SourceScanner;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use syn::visit::{self, Visit};
use syn::{Attribute, Expr, ImplItemFn, ItemFn, ItemImpl, ItemMod, Lit, Meta};

/// Doc tag that excludes a handler from documentation.
pub const HIDE_TAG: &str = "@hideFromAPIDocumentation";

/// A parsed Rust source file.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub syntax: syn::File,
}

/// Read and parse one file.
///
/// # Errors
///
/// Fails when the file cannot be read or is not valid Rust.
pub fn parse_source(path: &Path) -> Result<SourceFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let syntax = syn::parse_file(&content)
        .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;
    Ok(SourceFile {
        path: path.to_path_buf(),
        syntax,
    })
}

/// Parse every file, logging and dropping the ones that fail.
pub fn parse_sources(paths: &[PathBuf]) -> Vec<SourceFile> {
    let mut parsed = Vec::with_capacity(paths.len());
    for path in paths {
        match parse_source(path) {
            Ok(file) => parsed.push(file),
            Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
        }
    }
    debug!("Parsed {} of {} source files", parsed.len(), paths.len());
    parsed
}

/// A function that can serve as a route handler.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDoc {
    pub file: PathBuf,
    /// Module path, optional `Self` type, then the function name
    pub qualified: Vec<String>,
    /// Doc comment lines, with the single leading space of `/// ` removed
    pub doc: Vec<String>,
}

impl HandlerDoc {
    pub fn qualified_name(&self) -> String {
        self.qualified.join("::")
    }

    pub fn is_hidden(&self) -> bool {
        self.doc.iter().any(|line| line.trim_start().starts_with(HIDE_TAG))
    }

    fn matches(&self, segments: &[&str]) -> bool {
        segments.len() <= self.qualified.len()
            && self.qualified[self.qualified.len() - segments.len()..]
                .iter()
                .zip(segments)
                .all(|(a, b)| a == b)
    }
}

/// Every handler candidate of a project.
#[derive(Debug, Default)]
pub struct DocIndex {
    handlers: Vec<HandlerDoc>,
}

impl DocIndex {
    /// Scan and parse a project directory.
    pub fn from_project(root: &Path) -> Result<Self> {
        let scanner = SourceScanner::new(root.to_path_buf());
        let sources = scanner.scan()?;
        let parsed = parse_sources(&sources.files);
        Ok(Self::from_sources(root, &parsed))
    }

    /// Index already parsed files. Module paths are derived relative to `root`.
    pub fn from_sources(root: &Path, files: &[SourceFile]) -> Self {
        let mut handlers = Vec::new();
        for file in files {
            let mut collector = HandlerCollector {
                file: &file.path,
                modules: module_path(root, &file.path),
                self_type: None,
                found: &mut handlers,
            };
            collector.visit_file(&file.syntax);
        }
        debug!("Indexed {} handler candidates", handlers.len());
        Self { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Find a handler by reference. The first match in path order wins.
    pub fn lookup(&self, handler: &str) -> Option<&HandlerDoc> {
        let handler = handler.trim().trim_start_matches("crate::");
        let segments: Vec<&str> = handler.split("::").filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return None;
        }
        self.handlers.iter().find(|doc| doc.matches(&segments))
    }
}

impl HandlerResolver for DocIndex {
    fn resolves(&self, handler: &str) -> bool {
        self.lookup(handler).is_some()
    }

    fn is_hidden(&self, handler: &str) -> bool {
        self.lookup(handler).is_some_and(HandlerDoc::is_hidden)
    }
}

/// `src/handlers/users.rs` -> `["handlers", "users"]`; `main.rs`, `lib.rs` and `mod.rs`
/// contribute nothing.
fn module_path(root: &Path, file: &Path) -> Vec<String> {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if let Some(last) = segments.pop() {
        let stem = last.trim_end_matches(".rs").to_string();
        if !matches!(stem.as_str(), "main" | "lib" | "mod") {
            segments.push(stem);
        }
    }
    if segments.first().map(String::as_str) == Some("src") {
        segments.remove(0);
    }
    segments
}

fn doc_lines(attrs: &[Attribute]) -> Vec<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let Meta::NameValue(name_value) = &attr.meta {
            if let Expr::Lit(expr) = &name_value.value {
                if let Lit::Str(text) = &expr.lit {
                    let value = text.value();
                    if value.is_empty() {
                        lines.push(String::new());
                    }
                    for line in value.lines() {
                        lines.push(line.strip_prefix(' ').unwrap_or(line).to_string());
                    }
                }
            }
        }
    }
    lines
}

struct HandlerCollector<'a> {
    file: &'a Path,
    modules: Vec<String>,
    self_type: Option<String>,
    found: &'a mut Vec<HandlerDoc>,
}

impl HandlerCollector<'_> {
    fn record(&mut self, name: String, attrs: &[Attribute]) {
        let mut qualified = self.modules.clone();
        if let Some(self_type) = &self.self_type {
            qualified.push(self_type.clone());
        }
        qualified.push(name);
        self.found.push(HandlerDoc {
            file: self.file.to_path_buf(),
            qualified,
            doc: doc_lines(attrs),
        });
    }
}

impl<'ast> Visit<'ast> for HandlerCollector<'_> {
    fn visit_item_fn(&mut self, item: &'ast ItemFn) {
        // Nested functions are not addressable handlers.
        self.record(item.sig.ident.to_string(), &item.attrs);
    }

    fn visit_item_mod(&mut self, item: &'ast ItemMod) {
        self.modules.push(item.ident.to_string());
        visit::visit_item_mod(self, item);
        self.modules.pop();
    }

    fn visit_item_impl(&mut self, item: &'ast ItemImpl) {
        let self_type = match item.self_ty.as_ref() {
            syn::Type::Path(type_path) => type_path
                .path
                .segments
                .last()
                .map(|segment| segment.ident.to_string()),
            _ => None,
        };
        let previous = std::mem::replace(&mut self.self_type, self_type);
        visit::visit_item_impl(self, item);
        self.self_type = previous;
    }

    fn visit_impl_item_fn(&mut self, item: &'ast ImplItemFn) {
        self.record(item.sig.ident.to_string(), &item.attrs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index_of(files: &[(&str, &str)]) -> DocIndex {
        let root = PathBuf::from("/project");
        let parsed: Vec<SourceFile> = files
            .iter()
            .map(|(path, code)| SourceFile {
                path: root.join(path),
                syntax: syn::parse_file(code).unwrap(),
            })
            .collect();
        DocIndex::from_sources(&root, &parsed)
    }

    const USERS: &str = r#"
        /// List users
        ///
        /// Paginated.
        pub async fn index() {}

        /// @hideFromAPIDocumentation
        pub async fn internal() {}

        pub struct UserController;

        impl UserController {
            /** Show a user */
            pub fn show(&self) {
                fn helper() {}
            }
        }

        pub mod admin {
            /// Ban a user
            pub fn ban() {}
        }
    "#;

    #[test]
    fn test_module_path() {
        let root = Path::new("/p");
        assert_eq!(module_path(root, Path::new("/p/src/main.rs")), Vec::<String>::new());
        assert_eq!(module_path(root, Path::new("/p/src/api/mod.rs")), vec!["api"]);
        assert_eq!(
            module_path(root, Path::new("/p/src/handlers/users.rs")),
            vec!["handlers", "users"]
        );
    }

    #[test]
    fn test_collects_functions_methods_and_inline_modules() {
        let index = index_of(&[("src/handlers/users.rs", USERS)]);
        let names: Vec<String> = index.handlers.iter().map(HandlerDoc::qualified_name).collect();
        assert_eq!(
            names,
            vec![
                "handlers::users::index",
                "handlers::users::internal",
                "handlers::users::UserController::show",
                "handlers::users::admin::ban",
            ]
        );
    }

    #[test]
    fn test_doc_lines() {
        let index = index_of(&[("src/users.rs", USERS)]);
        let doc = index.lookup("index").unwrap();
        assert_eq!(doc.doc, vec!["List users", "", "Paginated."]);
        let show = index.lookup("UserController::show").unwrap();
        assert_eq!(show.doc, vec!["Show a user "]);
    }

    #[test]
    fn test_lookup_by_suffix() {
        let index = index_of(&[("src/handlers/users.rs", USERS)]);
        assert!(index.lookup("crate::handlers::users::index").is_some());
        assert!(index.lookup("users::admin::ban").is_some());
        assert!(index.lookup("other::index").is_none());
        assert!(index.lookup("helper").is_none());
        assert!(index.lookup("").is_none());
    }

    #[test]
    fn test_resolver() {
        let index = index_of(&[("src/users.rs", USERS)]);
        assert!(index.resolves("index"));
        assert!(!index.is_hidden("index"));
        assert!(index.is_hidden("internal"));
        assert!(!index.resolves("missing"));
        assert!(!index.is_hidden("missing"));
    }

    #[test]
    fn test_parse_source_errors() {
        let temp_dir = TempDir::new().unwrap();
        let broken = temp_dir.path().join("broken.rs");
        fs::write(&broken, "pub fn broken( {").unwrap();

        let err = parse_source(&broken).unwrap_err();
        assert!(err.to_string().contains("Failed to parse Rust syntax"));

        let err = parse_source(Path::new("/nonexistent/file.rs")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn test_from_project_skips_unparsable_files() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("good.rs"), "/// Hello\npub fn hello() {}").unwrap();
        fs::write(src.join("bad.rs"), "pub fn broken( {").unwrap();

        let index = DocIndex::from_project(temp_dir.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("good::hello").unwrap().doc, vec!["Hello"]);
    }
}
