use super::*;

#[test]
fn registry_decl_parses_plain_name() {
    let decl = RegistryDecl::parse("Backbone");
    assert_eq!(decl.name, "Backbone");
    assert!(!decl.primary);
    assert!(decl.children.is_empty());
}

#[test]
fn registry_decl_parses_primary_marker_and_children() {
    let decl = RegistryDecl::parse("*Model: Backbone, Head");
    assert_eq!(decl.name, "Model");
    assert!(decl.primary);
    assert_eq!(decl.children, vec!["Backbone".to_string(), "Head".to_string()]);
}

#[test]
fn registry_decl_trims_whitespace_between_children() {
    let decl = RegistryDecl::parse("Model:   A ,B,  C  ");
    assert_eq!(decl.children, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
}

#[test]
fn one_or_many_deserializes_single_and_list_forms() {
    #[derive(Deserialize)]
    struct Wrapper {
        v: OneOrMany,
    }
    let single: Wrapper = toml::from_str("v = \"field\"").unwrap();
    assert_eq!(single.v.as_vec(), vec!["field".to_string()]);

    let many: Wrapper = toml::from_str("v = [\"a\", \"b\"]").unwrap();
    assert_eq!(many.v.as_vec(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn load_or_default_falls_back_when_no_descriptor_exists() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = WorkspaceDescriptor::load_or_default(dir.path()).unwrap();
    assert_eq!(descriptor.name, "excore");
    assert!(Path::new(&descriptor.cache_dir).is_dir());
}

#[test]
fn load_reads_descriptor_file_and_normalizes_paths() {
    let dir = tempfile::tempdir().unwrap();
    let base_dir = dir.path().join("base");
    let descriptor_path = dir.path().join(".excore.toml");
    std::fs::write(
        &descriptor_path,
        format!(
            "name = \"myapp\"\nbase_dir = \"{}\"\nregistries = [\"*Model: Backbone\"]\n",
            base_dir.display()
        ),
    )
    .unwrap();

    let descriptor = WorkspaceDescriptor::load(&descriptor_path).unwrap();
    assert_eq!(descriptor.name, "myapp");
    assert_eq!(descriptor.registry_decls()[0].name, "Model");
    assert!(Path::new(&descriptor.cache_dir).starts_with(&descriptor.cache_base_dir));
}

#[test]
fn find_descriptor_walks_up_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(dir.path().join(DESCRIPTOR_FILE_NAME), "name = \"x\"\n").unwrap();

    let found = WorkspaceDescriptor::find_descriptor(&nested).unwrap();
    assert_eq!(found, dir.path().join(DESCRIPTOR_FILE_NAME));
}

#[test]
fn env_overrides_take_precedence_over_file_and_defaults() {
    std::env::set_var("EXCORE_VALIDATE", "0");
    let dir = tempfile::tempdir().unwrap();
    let descriptor = WorkspaceDescriptor::load_or_default(dir.path()).unwrap();
    assert!(!descriptor.excore_validate);
    std::env::remove_var("EXCORE_VALIDATE");
}
