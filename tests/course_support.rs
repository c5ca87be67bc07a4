#![allow(dead_code)]

use std::sync::Arc;

use ccx::{
    config::InheritanceMode,
    overrides::{
        CcxOverrideProvider, IndividualDueDateProvider, MemoryOverrideStore, OverrideProvider,
        ProviderChain,
    },
    tree::{Category, CourseTree, Outline},
};
use chrono::{DateTime, Utc};

pub const MOOC_START: &str = "2010-05-12T02:42:00Z";
pub const MOOC_DUE: &str = "2010-07-07T00:00:00Z";

pub fn date(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid date")
        .with_timezone(&Utc)
}

/// course > 2 chapters (start set) > 2 sequentials > 2 verticals (due set) >
/// 2 html blocks each.
pub fn mooc_outline() -> Outline {
    let mut course = Outline::new("course", Category::Course);
    for c in 0..2 {
        let mut chapter =
            Outline::new(format!("chapter-{c}"), Category::Chapter).with_field("start", MOOC_START);
        for s in 0..2 {
            let mut sequential = Outline::new(format!("seq-{c}-{s}"), Category::Sequential);
            for v in 0..2 {
                let mut vertical = Outline::new(format!("vert-{c}-{s}-{v}"), Category::Vertical)
                    .with_field("due", MOOC_DUE);
                for b in 0..2 {
                    vertical = vertical
                        .with_child(Outline::new(format!("block-{c}-{s}-{v}-{b}"), Category::Html));
                }
                sequential = sequential.with_child(vertical);
            }
            chapter = chapter.with_child(sequential);
        }
        course = course.with_child(chapter);
    }
    course
}

pub fn mooc_tree() -> CourseTree {
    CourseTree::from_outline(mooc_outline()).expect("build tree")
}

/// A chain with the ccx provider first and deadline extensions second, both
/// over one in-memory store.
pub fn memory_chain(inheritance: InheritanceMode) -> (Arc<MemoryOverrideStore>, ProviderChain) {
    let store = Arc::new(MemoryOverrideStore::new());
    let providers: Vec<Arc<dyn OverrideProvider>> = vec![
        Arc::new(CcxOverrideProvider::new(store.clone())),
        Arc::new(IndividualDueDateProvider::new(store.clone())),
    ];
    let chain = ProviderChain::new(providers, inheritance);
    (store, chain)
}
