mod common;

use asar_resolve::Split;
use asar_resolve::error::ErrorKind;
use common::{App, Fixture};
use rstest::rstest;
use std::path::Path;
use url::Url;

#[rstest]
#[case("")]
#[case("package.json")]
#[case("components/index.js")]
#[case("node_modules/express/lib/express.js")]
fn split_registered_archive(#[case] inner: &str) {
    let app = App::new();
    let full = app.archive.join(inner);
    let split = app.context.split_path(&full).unwrap();
    assert_eq!(split, Split::Archive { archive_path: app.archive.clone(), inner_path: inner.into() });
}

#[test]
fn split_normalizes_first() {
    let app = App::new();
    let messy = format!("{}/components/../dep/./index.js", app.archive.display());
    let split = app.context.split_path(messy.as_str()).unwrap();
    assert_eq!(split, Split::Archive { archive_path: app.archive.clone(), inner_path: "dep/index.js".into() });
}

#[cfg(unix)]
#[test]
fn split_accepts_relative_paths() {
    let app = App::new();
    let cwd = std::env::current_dir().unwrap();
    let relative = Path::new(&"../".repeat(cwd.components().count() - 1))
        .join(app.in_archive("dep/index.js").strip_prefix("/").unwrap());
    let split = app.context.split_path(&relative).unwrap();
    assert_eq!(split, Split::Archive { archive_path: app.archive.clone(), inner_path: "dep/index.js".into() });
}

#[test]
fn look_alikes_are_not_archives() {
    let app = App::new();
    let fixture = &app.fixture;
    fixture.write("other.asar", "");
    for path in [
        fixture.path("other.asar"),
        fixture.path("other.asar/index.js"),
        fixture.path("app.asarx/index.js"),
        fixture.path("app/index.js"),
        fixture.path("app.asar.unpacked/native/addon.node"),
    ] {
        assert_eq!(app.context.split_path(&path).unwrap(), Split::NotArchive, "{}", path.display());
    }
}

#[test]
fn registry_answers_is_archive_by_boundary() {
    let app = App::new();
    let registry = app.context.registry();
    assert!(registry.is_archive(&app.archive));
    assert!(registry.is_archive(&app.in_archive("sub/file.js")));
    assert!(!registry.is_archive(&app.fixture.path("other.asar/x.js")));
    assert_eq!(registry.resolve_archive_mapping(&app.in_mirror("lib/x.js")), Some(app.in_archive("lib/x.js")));
}

#[test]
fn mapping_is_none_without_mirrors() {
    let fixture = Fixture::new();
    let context = asar_resolve::Context::builder().disabled(false).build();
    assert!(context.registry().resolve_archive_mapping(&fixture.path("app/index.js")).is_none());
}

#[test]
fn byte_and_url_inputs() {
    let app = App::new();
    let full = app.in_archive("main.js");
    let expected = Split::Archive { archive_path: app.archive.clone(), inner_path: "main.js".into() };

    let bytes = full.display().to_string().into_bytes();
    assert_eq!(app.context.split_path(bytes.as_slice()).unwrap(), expected);

    let url = Url::from_file_path(&full).unwrap();
    assert_eq!(app.context.split_path(&url).unwrap(), expected);
}

#[test]
fn malformed_inputs_fail() {
    let app = App::new();
    let err = app.context.split_path(&b"/srv/\xff\xfe.asar"[..]).unwrap_err();
    assert!(matches!(&*err, ErrorKind::InvalidPath(_)));

    let url = Url::parse("https://example.com/app.asar/index.js").unwrap();
    let err = app.context.split_path(&url).unwrap_err();
    assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
}

#[test]
fn disabled_never_splits() {
    let app = App::disabled();
    assert!(app.context.is_disabled());
    assert_eq!(app.context.split_path(&app.archive).unwrap(), Split::NotArchive);
    assert_eq!(app.context.split_path(&app.in_archive("main.js")).unwrap(), Split::NotArchive);
    // Nothing is validated either.
    let url = Url::parse("https://example.com/app.asar").unwrap();
    assert_eq!(app.context.split_path(&url).unwrap(), Split::NotArchive);
}

#[test]
fn plain_paths_skip_the_filesystem() {
    let app = App::new();
    let before = app.native.calls().len();
    assert_eq!(app.context.split_path(Path::new("/srv/lib/index.js")).unwrap(), Split::NotArchive);
    assert_eq!(app.native.calls().len(), before);
}
