mod course_support;

use std::{collections::HashMap, sync::Arc};

use ccx::{
    OverrideError,
    config::{InheritanceMode, ProviderKind, Settings},
    fields::{Field, FieldValue},
    overrides::{ActiveContext, MemoryOverrideStore, ProviderChain, ResolutionPass},
    tree::{Category, CourseNode, CourseTree, Outline, TreeStore},
    types::{Location, NodeId},
};
use course_support::{MOOC_START, date, mooc_tree};
use tracing::Level;

fn settings_from(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::from_lookup(|key| env.get(key).cloned())
}

#[test]
fn settings_default_to_the_ccx_provider() {
    let settings = settings_from(&[]).expect("settings");
    assert_eq!(settings.providers(), &[ProviderKind::Ccx]);
    assert_eq!(settings.inheritance(), InheritanceMode::OverrideFirst);
    assert_eq!(settings.log_level(), Level::INFO);
    assert_eq!(settings.db_path().to_str(), Some("ccx.sqlite3"));
}

#[test]
fn settings_read_every_key() {
    let settings = settings_from(&[
        ("CCX_DB_PATH", "/tmp/overrides.db"),
        ("CCX_FIELD_OVERRIDE_PROVIDERS", "individual_due_dates, ccx"),
        ("CCX_INHERITANCE", "native_first"),
        ("CCX_LOG_LEVEL", "debug"),
    ])
    .expect("settings");

    assert_eq!(
        settings.providers(),
        &[ProviderKind::IndividualDueDates, ProviderKind::Ccx]
    );
    assert_eq!(settings.inheritance(), InheritanceMode::NativeFirst);
    assert_eq!(settings.log_level(), Level::DEBUG);
    assert_eq!(settings.db_path().to_str(), Some("/tmp/overrides.db"));

    let chain = ProviderChain::from_settings(&settings, Arc::new(MemoryOverrideStore::new()));
    assert_eq!(chain.names(), vec!["individual_due_dates", "ccx"]);
    assert_eq!(chain.inheritance(), InheritanceMode::NativeFirst);
}

#[test]
fn unknown_provider_names_are_a_configuration_error() {
    let err = settings_from(&[("CCX_FIELD_OVERRIDE_PROVIDERS", "ccx,bogus")]).unwrap_err();
    assert!(format!("{err:#}").contains("bogus"));
    assert!(settings_from(&[("CCX_INHERITANCE", "sideways")]).is_err());
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let settings = settings_from(&[("CCX_FIELD_OVERRIDE_PROVIDERS", "  "), ("CCX_DB_PATH", "")])
        .expect("settings");
    assert_eq!(settings.providers(), &[ProviderKind::Ccx]);
    assert_eq!(settings.db_path().to_str(), Some("ccx.sqlite3"));
}

#[test]
fn builder_matches_defaults() {
    let built = Settings::builder()
        .providers(vec![ProviderKind::Ccx, ProviderKind::IndividualDueDates])
        .build();
    assert_eq!(built.providers().len(), 2);
    assert_eq!(built.db_path(), Settings::default().db_path());
}

#[test]
fn tree_walks_follow_course_order() {
    let tree = mooc_tree();
    assert_eq!(tree.len(), 1 + 2 + 4 + 8 + 16);

    let chapter = tree.lookup(&Location::from("chapter-1")).expect("chapter");
    let children: Vec<_> = tree
        .children(chapter)
        .expect("children")
        .iter()
        .map(|id| tree.get_node(*id).expect("node").location().to_string())
        .collect();
    assert_eq!(children, vec!["seq-1-0", "seq-1-1"]);

    let block = tree.lookup(&Location::from("block-1-0-1-1")).expect("block");
    let ancestors: Vec<_> = tree
        .ancestors(block)
        .expect("ancestors")
        .into_iter()
        .map(|id| tree.get_node(id).expect("node").location().to_string())
        .collect();
    assert_eq!(ancestors, vec!["vert-1-0-1", "seq-1-0", "chapter-1", "course"]);

    let walk = tree.descendants(chapter).expect("walk");
    assert_eq!(walk.len(), 1 + 2 + 4 + 8);
    assert_eq!(walk[0], (chapter, 0));
    assert_eq!(walk.iter().map(|(_, d)| *d).max(), Some(3));
    assert_eq!(tree.parent(tree.root()).expect("parent"), None);
}

#[test]
fn duplicate_locations_are_rejected() {
    let outline = Outline::new("course", Category::Course)
        .with_child(Outline::new("same", Category::Chapter))
        .with_child(Outline::new("same", Category::Chapter));
    assert!(CourseTree::from_outline(outline).is_err());
}

#[test]
fn outline_values_must_match_field_kinds() {
    let bad_date =
        Outline::new("course", Category::Course).with_field("start", "next tuesday");
    assert!(CourseTree::from_outline(bad_date).is_err());

    let unknown = Outline::new("course", Category::Course).with_field("colour", "red");
    let err = CourseTree::from_outline(unknown).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OverrideError>(),
        Some(OverrideError::FieldNotFound(_))
    ));
}

#[test]
fn unknown_categories_parse_as_other() {
    let outline: Outline = serde_json::from_str(
        r#"{"location": "course", "category": "course",
            "children": [{"location": "v", "category": "video"}]}"#,
    )
    .expect("parse outline");
    let tree = CourseTree::from_outline(outline).expect("build tree");
    let video = tree.lookup(&Location::from("v")).expect("video");
    assert_eq!(tree.get_node(video).expect("node").category(), Category::Other);
}

/// A flat store keeping nodes keyed by location, as a modulestore would.
struct FlatStore {
    nodes: Vec<CourseNode>,
}

impl TreeStore for FlatStore {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn get_node(&self, id: NodeId) -> ccx::error::Result<&CourseNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| OverrideError::MissingNode(format!("#{}", id.0)))
    }

    fn lookup(&self, location: &Location) -> ccx::error::Result<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.location() == location)
            .map(NodeId)
            .ok_or_else(|| OverrideError::MissingNode(location.to_string()))
    }
}

#[test]
fn tree_stores_can_be_built_outside_the_crate() {
    let start = date(MOOC_START);
    let fields = [(Field::Start, FieldValue::Date(start))].into_iter().collect();
    let store = FlatStore {
        nodes: vec![
            CourseNode::new(
                "course",
                Category::Course,
                Default::default(),
                vec![NodeId(1)],
                None,
            ),
            CourseNode::new(
                "week-1",
                Category::Chapter,
                fields,
                vec![NodeId(2)],
                Some(NodeId(0)),
            ),
            CourseNode::new(
                "lesson",
                Category::Sequential,
                Default::default(),
                vec![],
                Some(NodeId(1)),
            ),
        ],
    };

    let lesson = store.lookup(&Location::from("lesson")).expect("lesson");
    assert_eq!(store.ancestors(lesson).expect("ancestors"), vec![NodeId(1), NodeId(0)]);
    assert_eq!(store.get_node(lesson).expect("node").display_name(), "lesson");

    let chain = ProviderChain::empty();
    let pass = ResolutionPass::new(&store, &chain, ActiveContext::base());
    assert_eq!(pass.start(lesson).expect("read"), Some(start));
    assert!(matches!(
        store.lookup(&Location::from("week-9")),
        Err(OverrideError::MissingNode(_))
    ));
}
