//! Behavioural tests for the review session.
//!
//! Removal and link invariants are checked over generated edit sequences;
//! the remaining cases walk through concrete review scenarios.

use coding_assist_api::{ApiError, MockCall, MockCodingApi, SuggestionsResponse, WireCode};
use coding_assist_core::models::{AnalysisCodeType, CodeEntry, CodeType, EncounterDetails};
use coding_assist_core::session::{AnalysisAddOutcome, CodingSession, Completion};
use coding_assist_core::SubmissionAssembler;
use proptest::prelude::*;

const CPT_IDS: [&str; 3] = ["c0", "c1", "c2"];
const ICD_IDS: [&str; 4] = ["i0", "i1", "i2", "i3"];

fn wire(id: &str, code: &str, description: &str) -> WireCode {
    WireCode {
        id: Some(id.into()),
        code: code.into(),
        description: description.into(),
        unit: None,
        modifiers: Vec::new(),
        rationale: None,
        is_manual: None,
    }
}

fn new_session(chart_text: &str) -> CodingSession {
    CodingSession::new(
        EncounterDetails {
            encounter_number: "ENC123456".into(),
            chart_text: chart_text.into(),
            ..Default::default()
        },
        Vec::new(),
        Vec::new(),
    )
}

fn loaded(response: SuggestionsResponse) -> CodingSession {
    let mut session = new_session("Patient has cough");
    let token = session
        .begin_generate()
        .unwrap_or_else(|e| panic!("begin_generate failed: {e}"));
    assert_eq!(session.complete_generate(token, Ok(response)), Completion::Applied);
    session
}

fn populated() -> CodingSession {
    loaded(SuggestionsResponse {
        cpt_codes: CPT_IDS
            .iter()
            .enumerate()
            .map(|(n, id)| wire(id, &format!("9921{n}"), "Office visit"))
            .collect(),
        icd_codes: ICD_IDS
            .iter()
            .enumerate()
            .map(|(n, id)| wire(id, &format!("R0{n}"), "Symptom"))
            .collect(),
        alerts: Vec::new(),
    })
}

fn displayed_ids(session: &CodingSession, code_type: CodeType) -> Vec<String> {
    session
        .displayed(code_type)
        .into_iter()
        .map(|entry| entry.id.clone())
        .collect()
}

#[derive(Debug, Clone)]
enum Edit {
    Remove(CodeType, usize),
    Link(usize, Vec<usize>),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0..CPT_IDS.len()).prop_map(|n| Edit::Remove(CodeType::Cpt, n)),
        (0..ICD_IDS.len()).prop_map(|n| Edit::Remove(CodeType::Icd, n)),
        (
            0..CPT_IDS.len(),
            proptest::collection::vec(0..ICD_IDS.len(), 0..4)
        )
            .prop_map(|(cpt, icds)| Edit::Link(cpt, icds)),
    ]
}

fn apply(session: &mut CodingSession, edit: &Edit) {
    match edit {
        Edit::Remove(CodeType::Cpt, n) => session.remove_code(CodeType::Cpt, CPT_IDS[*n]),
        Edit::Remove(CodeType::Icd, n) => session.remove_code(CodeType::Icd, ICD_IDS[*n]),
        Edit::Link(cpt, icds) => {
            let ids = icds.iter().map(|n| ICD_IDS[*n].to_string()).collect();
            // Linking a removed CPT is rejected; the sequence carries on.
            let _ = session.update_links(CPT_IDS[*cpt], ids);
        }
    }
}

proptest! {
    #[test]
    fn removed_entries_never_displayed(edits in proptest::collection::vec(edit_strategy(), 0..24)) {
        let mut session = populated();
        for edit in &edits {
            apply(&mut session, edit);
        }

        for code_type in [CodeType::Cpt, CodeType::Icd] {
            for entry in session.displayed(code_type) {
                prop_assert!(!session.removed().contains(&entry.id));
            }
        }
        for id in session.removed().iter() {
            prop_assert!(session.suggestions(CodeType::Cpt).iter().any(|e| &e.id == id)
                || session.suggestions(CodeType::Icd).iter().any(|e| &e.id == id));
        }
        prop_assert_eq!(session.suggestions(CodeType::Cpt).len(), CPT_IDS.len());
        prop_assert_eq!(session.suggestions(CodeType::Icd).len(), ICD_IDS.len());
    }

    #[test]
    fn removal_prunes_links(edits in proptest::collection::vec(edit_strategy(), 0..24)) {
        let mut session = populated();
        for edit in &edits {
            apply(&mut session, edit);
        }

        for (cpt_id, icd_ids) in session.links().iter() {
            prop_assert!(!session.removed().contains(cpt_id));
            prop_assert!(!icd_ids.is_empty());
            for icd_id in icd_ids {
                prop_assert!(!session.removed().contains(icd_id));
            }
        }
    }

    #[test]
    fn update_links_reads_back(cpt in 0..CPT_IDS.len(), icds in proptest::collection::vec(0..ICD_IDS.len(), 0..6)) {
        let mut session = populated();
        let ids: Vec<String> = icds.iter().map(|n| ICD_IDS[*n].to_string()).collect();

        session.update_links(CPT_IDS[cpt], ids.clone()).unwrap();
        prop_assert_eq!(session.linked_icd_ids(CPT_IDS[cpt]), ids.as_slice());

        session.update_links(CPT_IDS[cpt], ids.clone()).unwrap();
        prop_assert_eq!(session.linked_icd_ids(CPT_IDS[cpt]), ids.as_slice());
    }
}

#[test]
fn test_generate_reset_restores_display() {
    let mut session = populated();
    session.remove_code(CodeType::Cpt, "c0");
    session.remove_code(CodeType::Icd, "i3");

    let api = MockCodingApi::new().with_suggestions(Ok(SuggestionsResponse {
        cpt_codes: vec![wire("c0", "99210", "Office visit")],
        icd_codes: vec![wire("i3", "R03", "Symptom")],
        alerts: Vec::new(),
    }));
    session.generate_suggestions(&api).unwrap();

    assert_eq!(displayed_ids(&session, CodeType::Cpt), vec!["c0"]);
    assert_eq!(displayed_ids(&session, CodeType::Icd), vec!["i3"]);
    assert!(session.removed().is_empty());
}

#[test]
fn test_analysis_add_idempotent_on_code() {
    let mut session = populated();

    let first = session.add_code_from_analysis("R50.9", AnalysisCodeType::Icd);
    let second = session.add_code_from_analysis("R50.9", AnalysisCodeType::Icd);
    let third = session.add_code_from_analysis("R50.9", AnalysisCodeType::Cpt);

    assert!(matches!(first, AnalysisAddOutcome::Added(_)));
    assert_eq!(second, AnalysisAddOutcome::AlreadyAdded);
    assert_eq!(third, AnalysisAddOutcome::AlreadyAdded);
    assert_eq!(session.suggestions(CodeType::Icd).len(), ICD_IDS.len() + 1);
    assert_eq!(session.suggestions(CodeType::Cpt).len(), CPT_IDS.len());
    assert_eq!(session.analysis_additions().len(), 1);
}

#[test]
fn test_blank_chart_makes_no_calls() {
    let mut session = populated();
    session.remove_code(CodeType::Cpt, "c1");
    session.set_chart_text(" \n\t ");
    let before = session.clone();
    let api = MockCodingApi::new();

    assert!(session.generate_suggestions(&api).is_err());
    assert!(session.load_analysis(&api).is_err());

    assert_eq!(api.call_count(), 0);
    assert_eq!(session, before);
}

#[test]
fn test_cough_scenario() {
    let api = MockCodingApi::new().with_suggestions(Ok(SuggestionsResponse {
        cpt_codes: vec![wire("c1", "99213", "Office visit")],
        icd_codes: vec![wire("i1", "R05", "Cough")],
        alerts: Vec::new(),
    }));
    let mut session = new_session("Patient has cough");

    session.generate_suggestions(&api).unwrap();
    assert_eq!(displayed_ids(&session, CodeType::Cpt), vec!["c1"]);

    session.update_links("c1", vec!["i1".into()]).unwrap();
    session.remove_code(CodeType::Cpt, "c1");

    assert!(displayed_ids(&session, CodeType::Cpt).is_empty());
    assert!(!session.links().contains_key("c1"));
    assert_eq!(
        api.calls(),
        vec![MockCall::Suggestions("Patient has cough".into())]
    );
}

#[test]
fn test_icd_removal_strips_one_link() {
    let mut session = loaded(SuggestionsResponse {
        cpt_codes: vec![wire("c1", "99213", "Office visit")],
        icd_codes: vec![wire("i1", "R05", "Cough"), wire("i2", "R50.9", "Fever")],
        alerts: Vec::new(),
    });
    session
        .update_links("c1", vec!["i1".into(), "i2".into()])
        .unwrap();

    session.remove_code(CodeType::Icd, "i2");

    assert_eq!(session.linked_icd_ids("c1"), &["i1".to_string()]);
}

#[test]
fn test_submit_after_removing_everything() {
    let mut session = populated();
    for id in CPT_IDS {
        session.remove_code(CodeType::Cpt, id);
    }
    for id in ICD_IDS {
        session.remove_code(CodeType::Icd, id);
    }

    let submission = SubmissionAssembler::assemble(&session, false);

    assert!(submission.cpt_codes.is_empty());
    assert!(submission.icd_codes.is_empty());
    assert!(submission.code_links.is_empty());
    assert_eq!(submission.removed_code_ids.len(), CPT_IDS.len() + ICD_IDS.len());

    let api = MockCodingApi::new();
    assert_eq!(session.submit(&api, false), Completion::Applied);
    assert!(session.last_submission().is_some());
}

#[test]
fn test_empty_session_submission() {
    let session = new_session("");
    let submission = SubmissionAssembler::assemble(&session, true);

    assert!(submission.cpt_codes.is_empty());
    assert!(submission.is_flagged);
    assert!(submission.to_json().is_ok());
}

#[test]
fn test_stale_response_after_regenerate() {
    let mut session = new_session("Patient has cough");
    let first = session.begin_generate().unwrap();
    let second = session.begin_generate().unwrap();

    session.complete_generate(
        second,
        Ok(SuggestionsResponse {
            cpt_codes: vec![wire("new", "99214", "Office visit")],
            ..Default::default()
        }),
    );
    let late = session.complete_generate(first, Err(ApiError::Network("refused".into())));

    assert_eq!(late, Completion::Stale);
    assert!(session.alerts().is_empty());
    assert_eq!(displayed_ids(&session, CodeType::Cpt), vec!["new"]);
    assert!(!session.loading().suggestions);
}

#[test]
fn test_manual_codes_survive_until_regenerate() {
    let mut session = populated();
    let entry = CodeEntry::manual_cpt("96372", "Injection", 1, &[], None).unwrap();
    let id = entry.id.clone();
    session.add_manual_code(entry);

    assert!(displayed_ids(&session, CodeType::Cpt).contains(&id));

    let api = MockCodingApi::new();
    session.generate_suggestions(&api).unwrap();
    assert!(displayed_ids(&session, CodeType::Cpt).is_empty());
}

#[test]
fn test_manual_duplicates_by_code_are_kept() {
    let mut session = populated();
    let left = CodeEntry::manual_cpt("96372", "Injection", 1, &["LT".into()], None).unwrap();
    let right = CodeEntry::manual_cpt("96372", "Injection", 1, &["RT".into()], None).unwrap();
    assert_ne!(left.id, right.id);
    session.add_manual_code(left.clone());
    session.add_manual_code(right.clone());

    let displayed = displayed_ids(&session, CodeType::Cpt);
    assert!(displayed.contains(&left.id));
    assert!(displayed.contains(&right.id));
    assert_eq!(displayed.len(), CPT_IDS.len() + 2);

    let submission = SubmissionAssembler::assemble(&session, false);
    let injections: Vec<Vec<String>> = submission
        .cpt_codes
        .iter()
        .filter(|code| code.code == "96372")
        .map(|code| code.modifiers.clone())
        .collect();
    assert_eq!(injections, vec![vec!["LT".to_string()], vec!["RT".to_string()]]);
}

#[test]
fn test_mismatched_removal_type_keeps_links_valid() {
    let mut session = populated();
    session.update_links("c1", vec!["i1".into()]).unwrap();

    session.remove_code(CodeType::Icd, "c1");
    session.remove_code(CodeType::Cpt, "not-a-code");

    assert!(!session.links().contains_key("c1"));
    assert!(!displayed_ids(&session, CodeType::Cpt).contains(&"c1".to_string()));
    assert_eq!(
        SubmissionAssembler::assemble(&session, false).removed_code_ids,
        vec!["c1"]
    );
}

#[test]
fn test_submit_failure_keeps_review_state() {
    let mut session = populated();
    session.remove_code(CodeType::Icd, "i0");
    session.update_links("c1", vec!["i1".into()]).unwrap();
    let before_links = session.links().clone();
    let api = MockCodingApi::new().with_update(Err(ApiError::Timeout(
        std::time::Duration::from_secs(30),
    )));

    session.submit(&api, true);

    assert_eq!(session.submit_error(), Some("Request timed out. Please try again."));
    assert_eq!(session.links(), &before_links);
    assert!(session.removed().contains("i0"));
    assert_eq!(displayed_ids(&session, CodeType::Icd).len(), ICD_IDS.len() - 1);

    api.set_update(Ok(serde_json::json!({ "success": true })));
    session.submit(&api, true);
    assert_eq!(session.submit_error(), None);
}
