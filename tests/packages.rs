use common::ClassBuilder;
use loader::{
    LoadError, LoaderId, LoaderOptions, LoaderRegistry, NoFinder, Origin, PackageDefinition,
    ParentLoader, ProtectionDomain,
};

mod common;

fn full_definition(name: &str, seal_base: Option<Origin>) -> PackageDefinition {
    PackageDefinition {
        name: name.to_string(),
        spec_title: Some("title".to_string()),
        spec_version: Some("1.0".to_string()),
        spec_vendor: Some("Vendor".to_string()),
        impl_title: Some("Title".to_string()),
        impl_version: Some("1.1".to_string()),
        impl_vendor: Some("implementation vendor".to_string()),
        seal_base,
    }
}

#[test]
fn defines_packages_with_metadata() {
    let registry = LoaderRegistry::default();
    let loader = registry.new_loader(NoFinder).unwrap();
    let seal = Origin::new("file:");

    let package = loader
        .define_package(full_definition("test.package", Some(seal.clone())))
        .expect("package to define");

    assert_eq!(package.name(), "test.package");
    assert_eq!(package.loader(), loader.id());
    assert_eq!(package.specification_title(), Some("title"));
    assert_eq!(package.specification_version(), Some("1.0"));
    assert_eq!(package.specification_vendor(), Some("Vendor"));
    assert_eq!(package.implementation_title(), Some("Title"));
    assert_eq!(package.implementation_version(), Some("1.1"));
    assert_eq!(package.implementation_vendor(), Some("implementation vendor"));
    assert!(package.is_sealed());
    assert!(package.is_sealed_with(&seal));
    assert!(!package.is_sealed_with(&Origin::new("file:/elsewhere/")));

    assert_eq!(loader.get_package("test.package").as_deref(), Some(&*package));
}

#[test]
fn refuses_to_define_a_package_twice() {
    let registry = LoaderRegistry::default();
    let loader = registry.new_loader(NoFinder).unwrap();

    loader
        .define_package(full_definition("test.package", None))
        .unwrap();

    let err = loader
        .define_package(PackageDefinition::named("test.package"))
        .unwrap_err();

    match err {
        LoadError::AlreadyDefined(name) => assert_eq!(name, "test.package"),
        other => panic!("expected AlreadyDefined, got {:?}", other),
    }

    // The first definition is untouched
    let package = loader.get_package("test.package").unwrap();
    assert_eq!(package.specification_title(), Some("title"));
}

#[test]
fn bare_packages_are_unsealed() {
    let registry = LoaderRegistry::default();
    let loader = registry.new_loader(NoFinder).unwrap();

    let package = loader
        .define_package(PackageDefinition::named("bare"))
        .unwrap();

    assert!(!package.is_sealed());
    assert!(package.seal_base().is_none());
    assert!(package.specification_version().is_none());
    assert!(!package.is_compatible_with("1.0").unwrap());
}

#[test]
fn ancestors_packages_are_visible_and_reserved() {
    let registry = LoaderRegistry::default();
    let parent = registry.new_loader(NoFinder).unwrap();
    let child = registry
        .new_loader_with(
            LoaderOptions::default().with_parent(ParentLoader::Loader(parent.clone())),
            NoFinder,
        )
        .unwrap();

    parent
        .define_package(full_definition("inherited", None))
        .unwrap();
    child
        .define_package(PackageDefinition::named("own"))
        .unwrap();

    assert_eq!(
        child.get_package("inherited").map(|p| p.loader()),
        Some(parent.id())
    );
    assert!(parent.get_package("own").is_none());

    let err = child
        .define_package(PackageDefinition::named("inherited"))
        .unwrap_err();
    assert!(matches!(err, LoadError::AlreadyDefined(_)), "{:?}", err);

    let names: Vec<_> = child
        .get_packages()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, ["inherited", "own"]);
    assert_eq!(parent.get_packages().len(), 1);
}

#[test]
fn defining_classes_creates_packages() {
    let registry = LoaderRegistry::default();
    let loader = registry.new_loader(NoFinder).unwrap();
    assert!(loader.get_package("implicit.pkg").is_none());

    let bytes = ClassBuilder::new("implicit.pkg.Thing").build();
    let class = loader
        .define_class(None, &bytes, 0, bytes.len(), None)
        .unwrap();

    let package = loader.get_package("implicit.pkg").expect("package to exist");
    assert_eq!(package.loader(), loader.id());
    assert!(!package.is_sealed());
    assert!(package.implementation_title().is_none());
    assert_eq!(class.package().map(|p| p.name()), Some("implicit.pkg"));

    // Explicit definition after the fact is refused
    let err = loader
        .define_package(PackageDefinition::named("implicit.pkg"))
        .unwrap_err();
    assert!(matches!(err, LoadError::AlreadyDefined(_)), "{:?}", err);

    // Unpackaged classes get no package
    let bare = ClassBuilder::new("Bare").build();
    let bare = loader.define_class(None, &bare, 0, bare.len(), None).unwrap();
    assert!(bare.package().is_none());
}

#[test]
fn sealed_packages_only_accept_their_origin() {
    let registry = LoaderRegistry::default();
    let loader = registry.new_loader(NoFinder).unwrap();
    let home = Origin::new("file:/opt/app/lib.jar");

    loader
        .define_package(full_definition("sealed.pkg", Some(home.clone())))
        .unwrap();

    let outsider = ClassBuilder::new("sealed.pkg.Outsider").build();
    for domain in [
        None,
        Some(ProtectionDomain::from_origin(Origin::new("file:/tmp/evil.jar"))),
    ] {
        let err = loader
            .define_class(None, &outsider, 0, outsider.len(), domain)
            .unwrap_err();

        match err {
            LoadError::SealingViolation { package, sealed_to } => {
                assert_eq!(package, "sealed.pkg");
                assert_eq!(sealed_to, home.as_str());
            }
            other => panic!("expected a sealing violation, got {:?}", other),
        }
    }

    let insider = ClassBuilder::new("sealed.pkg.Insider").build();
    let class = loader
        .define_class(
            None,
            &insider,
            0,
            insider.len(),
            Some(ProtectionDomain::from_origin(home)),
        )
        .unwrap();
    assert_eq!(class.loader(), loader.id());
    assert!(loader.find_loaded_class("sealed.pkg.Outsider").is_none());
}

#[test]
fn compares_specification_versions() {
    let registry = LoaderRegistry::default();
    let system = registry.system_loader().unwrap();
    assert_eq!(system.id(), LoaderId::SYSTEM);

    let package = system
        .define_package(PackageDefinition {
            spec_version: Some("1.4.2".to_string()),
            ..PackageDefinition::named("versioned")
        })
        .unwrap();

    assert!(package.is_compatible_with("1.4").unwrap());
    assert!(package.is_compatible_with("1.4.2").unwrap());
    assert!(!package.is_compatible_with("1.5").unwrap());
    assert!(package.is_compatible_with("not.a.version").is_err());
}
