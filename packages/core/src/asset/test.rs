// Asset Tests

use super::*;
use crate::environment::BuildMode;

fn value(file_path: &str, asset_type: &str) -> AssetValue {
    AssetValue {
        id: String::new(),
        file_path: ProjectPath::new(file_path),
        asset_type: asset_type.to_string(),
        env: Environment::default(),
        content_hash: None,
        content_key: None,
        map_key: None,
        query: IndexMap::new(),
        is_source: true,
        side_effects: true,
        is_inline: false,
        is_isolated: false,
        pipeline: None,
        unique_key: None,
        stats: AssetStats::default(),
        symbols: None,
        dependencies: Vec::new(),
        meta: serde_json::Map::new(),
        plugin: None,
        config_path: None,
        config_key_path: None,
    }
}

fn asset(file_path: &str, asset_type: &str, content: &[u8]) -> UncommittedAsset {
    UncommittedAsset::new(
        value(file_path, asset_type),
        file_path.to_string(),
        content.to_vec(),
        Arc::new(InvalidationTracker::new()),
    )
}

mod identity_tests {
    use super::*;

    #[test]
    fn should_change_id_when_the_type_changes() {
        let mut a = asset("src/x.ts", "ts", b"x");
        let before = a.compute_id();
        a.value.asset_type = "js".to_string();
        assert_ne!(a.compute_id(), before);
    }

    #[test]
    fn should_not_depend_on_query_order() {
        let mut a = asset("src/x.ts", "ts", b"x");
        a.value.query.insert("a".into(), "1".into());
        a.value.query.insert("b".into(), "2".into());
        let mut b = asset("src/x.ts", "ts", b"x");
        b.value.query.insert("b".into(), "2".into());
        b.value.query.insert("a".into(), "1".into());
        assert_eq!(a.compute_id(), b.compute_id());
    }

    #[test]
    fn should_change_id_when_the_environment_changes() {
        let mut a = asset("src/x.ts", "ts", b"x");
        let before = a.compute_id();
        a.value.env.mode = BuildMode::Production;
        assert_ne!(a.compute_id(), before);
    }
}

mod commit_tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn should_populate_hash_size_and_id() {
        let mut a = asset("src/x.ts", "ts", b"hello");
        a.commit(Path::new("/project"));
        assert_eq!(a.value.content_hash.as_deref(), Some(crate::hashing::hash_bytes(b"hello").as_str()));
        assert_eq!(a.value.stats.size, 5);
        assert!(!a.value.id.is_empty());
    }

    #[test]
    fn should_publish_dependencies_with_absolute_resolve_from() {
        let mut a = asset("src/x.ts", "ts", b"hello");
        let root = Path::new("/project");
        {
            let mut facade = MutableAsset::new(&mut a, root);
            facade.add_dependency(DependencyDescriptor {
                specifier: "./util".to_string(),
                resolve_from: Some(root.join("src/other.ts")),
                ..DependencyDescriptor::default()
            });
        }
        a.commit(root);
        assert_eq!(a.value.dependencies.len(), 1);
        let dependency = &a.value.dependencies[0];
        assert_eq!(dependency.specifier, "./util");
        assert_eq!(
            dependency.resolve_from.as_deref(),
            Some(root.join("src/other.ts").as_path())
        );
    }
}

mod facade_tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn should_expose_absolute_paths_to_plugins() {
        let mut a = asset("src/x.ts", "ts", b"x");
        let facade = MutableAsset::new(&mut a, Path::new("/project"));
        assert_eq!(facade.file_path(), Path::new("/project/src/x.ts"));
    }

    #[test]
    fn should_mark_the_ast_dirty_when_set_through_the_facade() {
        let mut a = asset("src/x.ts", "ts", b"x");
        {
            let mut facade = MutableAsset::new(&mut a, Path::new("/project"));
            facade.set_ast(Ast::new("tree".to_string()));
        }
        assert!(a.is_ast_dirty);
        assert!(a.ast.is_some());
    }

    #[test]
    fn should_round_trip_content_through_the_facade() {
        let mut a = asset("src/x.ts", "ts", b"x");
        {
            let mut facade = MutableAsset::new(&mut a, Path::new("/project"));
            facade.set_content("changed".as_bytes().to_vec());
        }
        assert_eq!(a.content, b"changed");
    }
}

mod ast_tests {
    use super::*;

    #[test]
    fn should_downcast_to_the_original_type() {
        let ast = Ast::new(vec![1u32, 2, 3]);
        assert_eq!(ast.downcast_ref::<Vec<u32>>(), Some(&vec![1u32, 2, 3]));
        assert!(ast.downcast_ref::<String>().is_none());
    }

    #[test]
    fn should_clear_the_dirty_bit_with_the_ast() {
        let mut a = asset("src/x.ts", "ts", b"x");
        a.set_ast(Ast::new(1u8), true);
        a.clear_ast();
        assert!(a.ast.is_none());
        assert!(!a.is_ast_dirty);
    }
}

mod serialization_tests {
    use super::*;

    #[test]
    fn should_skip_the_ast_in_transport() {
        let mut a = asset("src/x.ts", "ts", b"x");
        a.set_ast(Ast::new(1u8), true);
        let json = serde_json::to_string(&a).unwrap();
        let back: UncommittedAsset = serde_json::from_str(&json).unwrap();
        assert!(back.ast.is_none());
        assert!(!back.is_ast_dirty);
        assert_eq!(back.content, a.content);
        assert_eq!(back.value, a.value);
    }
}
