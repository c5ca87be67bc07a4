mod course_support;

use std::collections::HashMap;

use ccx::{
    OverrideError, Result,
    config::InheritanceMode,
    fields::FieldValue,
    grading::{AssignmentType, GradeSummary, GradingPolicy, Score, StudentInfo, compute_grade},
    overrides::{ActiveContext, ProviderChain, ResolutionPass, set_override},
    tree::{Category, CourseNode, CourseTree, Outline, TreeStore},
    types::{CcxId, Location, NodeId, StudentId},
};
use course_support::{date, memory_chain};

type Scores = HashMap<(StudentId, Location), Score>;

fn problem(location: &str, max_score: f64) -> Outline {
    Outline::new(location, Category::Problem).with_field("max_score", max_score)
}

fn graded(location: &str, format: &str) -> Outline {
    Outline::new(location, Category::Sequential).with_field("format", format)
}

fn chapter(location: &str, start: &str) -> Outline {
    Outline::new(location, Category::Chapter).with_field("start", start)
}

fn course() -> CourseTree {
    let outline = Outline::new("course", Category::Course)
        .with_child(
            chapter("week1", "2015-01-01T00:00:00Z").with_child(
                graded("hw1", "Homework").with_child(
                    Outline::new("hw1-v", Category::Vertical).with_child(problem("hw1-p1", 1.0)),
                ),
            ),
        )
        .with_child(
            chapter("week2", "2015-01-01T00:00:00Z")
                .with_child(
                    graded("hw2", "Homework")
                        .with_child(problem("hw2-p1", 2.0))
                        .with_child(problem("hw2-p2", 2.0))
                        .with_child(Outline::new("hw2-notes", Category::Html)),
                )
                .with_child(graded("midterm", "Midterm").with_child(problem("mid-p1", 10.0))),
        )
        .with_child(
            chapter("week3", "2099-01-01T00:00:00Z")
                .with_child(graded("hw3", "Homework").with_child(problem("hw3-p1", 1.0))),
        )
        .with_child(
            chapter("exam", "2015-01-01T00:00:00Z")
                .with_field("visible_to_staff_only", true)
                .with_child(graded("final", "Final").with_child(problem("final-p1", 5.0))),
        )
        .with_child(
            chapter("practice", "2015-01-01T00:00:00Z")
                .with_child(graded("drills", "Practice").with_child(problem("drill-p1", 1.0))),
        );
    CourseTree::from_outline(outline).expect("build tree")
}

fn policy() -> GradingPolicy {
    GradingPolicy::new(vec![
        AssignmentType::builder()
            .category("Homework")
            .short_label("HW")
            .weight(0.5)
            .min_count(3usize)
            .drop_count(1usize)
            .build(),
        AssignmentType::builder()
            .category("Midterm")
            .weight(0.3)
            .build(),
        AssignmentType::builder()
            .category("Final")
            .weight(0.2)
            .build(),
    ])
    .with_cutoff("A", 0.9)
    .with_cutoff("B", 0.8)
    .with_cutoff("Pass", 0.5)
}

fn ada_scores() -> Scores {
    let mut scores = Scores::new();
    for (loc, earned, possible) in [
        ("hw1-p1", 1.0, 1.0),
        ("hw2-p1", 1.0, 2.0),
        ("hw2-p2", 2.0, 2.0),
        ("mid-p1", 7.0, 10.0),
        ("final-p1", 5.0, 5.0),
    ] {
        scores.insert(
            (StudentId::from("ada"), Location::from(loc)),
            Score::new(earned, possible),
        );
    }
    scores
}

fn now() -> chrono::DateTime<chrono::Utc> {
    date("2016-01-01T00:00:00Z")
}

fn grade(pass: &ResolutionPass<'_>, student: &StudentInfo, policy: &GradingPolicy) -> GradeSummary {
    compute_grade(pass, student, policy, &ada_scores(), now()).expect("grade")
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn one_item_earned_in_full_is_one_hundred_percent() {
    let outline = Outline::new("course", Category::Course)
        .with_child(graded("hw", "Homework").with_child(problem("p", 1.0)));
    let tree = CourseTree::from_outline(outline).expect("build tree");
    let policy = GradingPolicy::new(vec![
        AssignmentType::builder()
            .category("Homework")
            .weight(1.0)
            .min_count(1usize)
            .build(),
    ]);
    let chain = ProviderChain::empty();
    let student = StudentInfo::learner("ada");

    let mut scores = Scores::new();
    scores.insert((student.id.clone(), Location::from("p")), Score::new(1.0, 1.0));
    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::base());
    let full = compute_grade(&pass, &student, &policy, &scores, now()).expect("grade");
    assert!(close(full.total_percent, 1.0));

    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::base());
    let none = compute_grade(&pass, &student, &policy, &Scores::new(), now()).expect("grade");
    assert!(close(none.total_percent, 0.0));
    let homework = none.category("Homework").expect("homework");
    assert_eq!(homework.items.len(), 1);
    assert!(!homework.items[0].attempted);
}

#[test]
fn learner_grade_drops_lowest_homework_and_skips_hidden_and_future_work() {
    let tree = course();
    let chain = ProviderChain::empty();
    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::base());

    let summary = grade(&pass, &StudentInfo::learner("ada"), &policy());

    let homework = summary.category("Homework").expect("homework");
    assert_eq!(homework.items.len(), 3);
    assert_eq!(homework.padded, 0);
    assert_eq!(homework.dropped, vec![Location::from("hw2-p1")]);
    assert!(close(homework.percent, 1.0));
    assert!(close(homework.earned, 3.0));
    assert!(close(homework.possible, 3.0));

    let midterm = summary.category("Midterm").expect("midterm");
    assert!(close(midterm.percent, 0.7));

    let final_exam = summary.category("Final").expect("final");
    assert!(final_exam.items.is_empty());
    assert!(close(final_exam.contribution(), 0.0));

    assert!(summary.category("Practice").is_none());
    assert!(close(summary.total_percent, 0.5 + 0.21));
    assert_eq!(summary.letter_grade.as_deref(), Some("Pass"));
}

#[test]
fn staff_see_staff_only_items() {
    let tree = course();
    let chain = ProviderChain::empty();
    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::base());

    let summary = grade(&pass, &StudentInfo::staff("ada"), &policy());

    let final_exam = summary.category("Final").expect("final");
    assert_eq!(final_exam.items.len(), 1);
    assert!(close(summary.total_percent, 0.5 + 0.21 + 0.2));
    assert_eq!(summary.letter_grade.as_deref(), Some("A"));
}

#[test]
fn ccx_release_date_brings_future_work_into_the_grade() {
    let tree = course();
    let (_, chain) = memory_chain(InheritanceMode::default());
    let ccx = CcxId::from("ccx-1");
    set_override(
        &tree,
        &chain,
        &ccx,
        &Location::from("week3"),
        "start",
        &FieldValue::Date(date("2015-06-01T00:00:00Z")),
    )
    .expect("override start");

    let active = ActiveContext::for_ccx(ccx).with_student("ada");
    let pass = ResolutionPass::new(&tree, &chain, active);
    let summary = grade(&pass, &StudentInfo::learner("ada"), &policy());

    let homework = summary.category("Homework").expect("homework");
    assert_eq!(homework.items.len(), 4);
    assert_eq!(homework.dropped, vec![Location::from("hw3-p1")]);
    assert!(close(homework.percent, 2.5 / 3.0));
}

#[test]
fn ccx_visibility_override_hides_work() {
    let tree = course();
    let (_, chain) = memory_chain(InheritanceMode::default());
    let ccx = CcxId::from("ccx-1");
    set_override(
        &tree,
        &chain,
        &ccx,
        &Location::from("midterm"),
        "visible_to_staff_only",
        &FieldValue::Bool(true),
    )
    .expect("override visibility");

    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::for_ccx(ccx));
    let summary = grade(&pass, &StudentInfo::learner("ada"), &policy());

    assert!(summary.category("Midterm").expect("midterm").items.is_empty());
    assert!(close(summary.total_percent, 0.5));
}

#[test]
fn item_weight_rescales_points() {
    let tree = course();
    let (_, chain) = memory_chain(InheritanceMode::default());
    let ccx = CcxId::from("ccx-1");
    set_override(
        &tree,
        &chain,
        &ccx,
        &Location::from("mid-p1"),
        "weight",
        &FieldValue::Float(20.0),
    )
    .expect("override weight");

    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::for_ccx(ccx));
    let summary = grade(&pass, &StudentInfo::learner("ada"), &policy());

    let midterm = summary.category("Midterm").expect("midterm");
    assert!(close(midterm.earned, 14.0));
    assert!(close(midterm.possible, 20.0));
    assert!(close(midterm.percent, 0.7));
}

#[test]
fn missing_homework_is_padded_with_zeros() {
    let tree = course();
    let chain = ProviderChain::empty();
    let mut policy = policy();
    policy.grader[0].min_count = 5;
    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::base());

    let summary = grade(&pass, &StudentInfo::learner("ada"), &policy);

    let homework = summary.category("Homework").expect("homework");
    assert_eq!(homework.padded, 2);
    // a placeholder is dropped before the real 50% item
    assert!(homework.dropped.is_empty());
    assert!(close(homework.percent, 2.5 / 4.0));
}

#[test]
fn summary_renders_as_a_table() {
    let tree = course();
    let chain = ProviderChain::empty();
    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::base());
    let summary = grade(&pass, &StudentInfo::learner("ada"), &policy());

    let table = summary.to_table();
    assert!(table.contains("Grade Summary for ada"));
    assert!(table.contains("HW"));
    assert!(table.contains("71.00%"));
}

#[test]
fn grading_policy_reads_edx_json() {
    let policy: GradingPolicy = serde_json::from_str(
        r#"{
            "GRADER": [
                {"type": "Homework", "short_label": "HW", "weight": 0.4, "min_count": 12, "drop_count": 2},
                {"type": "Final Exam", "weight": 0.6}
            ],
            "GRADE_CUTOFFS": {"Pass": 0.5}
        }"#,
    )
    .expect("parse policy");
    policy.validate().expect("valid policy");

    let final_exam = policy.category("Final Exam").expect("final");
    assert_eq!(final_exam.label(), "Final Exam");
    assert_eq!(final_exam.drop_count, 0);
    assert_eq!(policy.letter_grade(0.49), None);
    assert_eq!(policy.passing_threshold(), Some(0.5));
}

#[test]
fn invalid_policies_are_rejected() {
    let duplicate = GradingPolicy::new(vec![
        AssignmentType::builder().category("Lab").weight(0.5).build(),
        AssignmentType::builder().category("Lab").weight(0.5).build(),
    ]);
    assert!(duplicate.validate().is_err());

    let negative =
        GradingPolicy::new(vec![AssignmentType::builder().category("Lab").weight(-0.1).build()]);
    assert!(negative.validate().is_err());

    let cutoff = GradingPolicy::default().with_cutoff("A", 1.5);
    assert!(cutoff.validate().is_err());
}

/// A tree store that has lost one of its nodes.
struct LossyTree {
    inner: CourseTree,
    lost:  NodeId,
}

impl TreeStore for LossyTree {
    fn root(&self) -> NodeId {
        self.inner.root()
    }

    fn get_node(&self, id: NodeId) -> Result<&CourseNode> {
        if id == self.lost {
            return Err(OverrideError::MissingNode(format!("#{}", id.0)));
        }
        self.inner.get_node(id)
    }

    fn lookup(&self, location: &Location) -> Result<NodeId> {
        self.inner.lookup(location)
    }
}

#[test]
fn a_missing_node_aborts_the_grade() {
    let inner = course();
    let lost = inner.lookup(&Location::from("mid-p1")).expect("node");
    let tree = LossyTree { inner, lost };
    let chain = ProviderChain::empty();
    let pass = ResolutionPass::new(&tree, &chain, ActiveContext::base());

    let err = compute_grade(&pass, &StudentInfo::learner("ada"), &policy(), &ada_scores(), now())
        .unwrap_err();
    assert!(matches!(err, OverrideError::MissingNode(_)));
}
