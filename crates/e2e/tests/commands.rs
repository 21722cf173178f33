//! Command layer against the in-memory page

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use osd_e2e::commands::console::{EDITOR, FONT_SIZE_INPUT, SAVE_SETTINGS, SETTINGS_BUTTON};
use osd_e2e::commands::date_picker::{
    ABSOLUTE_DATE_INPUT, ABSOLUTE_TAB, END_DATE_BUTTON, QUERY_SUBMIT_BUTTON, START_DATE_BUTTON,
};
use osd_e2e::commands::loader::{LOADING_INDICATOR, QUERY_HITS, RECENT_ITEMS_BUTTON};
use osd_e2e::commands::query_bar::{
    ADD_FILTER, CANCEL_FILTER, COMBO_BOX_INPUT, EDIT_FILTER, FILTER_FIELD, FILTER_OPERATOR,
    LANGUAGE_BUTTON, LANGUAGE_TOGGLE, QUERY_INPUT, SAVE_FILTER,
};
use osd_e2e::commands::saved_objects::{
    CHECK_CONFLICTS, CONFIRM_BUTTON, CREATE_NEW_COPIES, DONE_BUTTON, IMPORT_BUTTON, IMPORT_FLYOUT,
    IMPORT_OBJECTS, NEW_BADGE, OVERWRITE_DISABLED, OVERWRITE_ENABLED, RESULT_ROW, RESULT_TITLE,
};
use osd_e2e::commands::{CommandLog, Commands, ImportMode, ImportSavedObjects, QueryLanguage};
use osd_e2e::config::Credentials;
use osd_e2e::memory::{MemoryDom, MemoryPage, NodeId, Trigger};
use osd_e2e::pages::{HomePage, LoginPage};
use osd_e2e::{E2eError, RunConfig, Selector};

const ROOT: NodeId = MemoryDom::ROOT;

fn config(timeout_ms: u64) -> RunConfig {
    let mut config = RunConfig::default();
    config.timeouts.default_command_ms = timeout_ms;
    config.timeouts.poll_interval_ms = 5;
    config
}

/// A combo box: clickable wrapper holding a search input; Enter commits the typed text
fn combo(dom: &mut MemoryDom, parent: NodeId, subj: &str) -> NodeId {
    let wrapper = dom.add_subj(parent, subj, "");
    let input = dom.add_input(wrapper, COMBO_BOX_INPUT, "");
    dom.on(Selector::test_subj(subj), Trigger::Enter, move |dom, _| {
        let typed = dom.value_of(input).unwrap_or_default().to_string();
        dom.set_text(wrapper, &typed);
        dom.set_value(input, "");
    });
    wrapper
}

#[tokio::test]
async fn test_wait_for_loader_returns_once_indicator_is_gone() {
    let page = MemoryPage::with(|dom| {
        let indicator = dom.add_subj(ROOT, LOADING_INDICATOR, "");
        dom.after(Duration::from_millis(30), move |dom| dom.remove(indicator));
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let start = Instant::now();
    cy.wait_for_loader(false).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(log.snapshot()[0].name, "waitForLoader");
}

#[tokio::test]
async fn test_wait_for_loader_times_out_while_indicator_stays() {
    let page = MemoryPage::with(|dom| {
        dom.add_subj(ROOT, LOADING_INDICATOR, "");
    });
    let config = config(60);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let start = Instant::now();
    let err = cy.wait_for_loader(false).await.unwrap_err();
    assert!(start.elapsed() >= Duration::from_millis(60));
    match err {
        E2eError::Timeout { condition, elapsed_ms } => {
            assert!(condition.contains(LOADING_INDICATOR));
            assert!(elapsed_ms >= 60);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wait_for_loader_with_enhancements_waits_for_recent_items() {
    let page = MemoryPage::with(|dom| {
        dom.add_subj(ROOT, LOADING_INDICATOR, "");
        dom.after(Duration::from_millis(20), |dom| {
            dom.add_subj(MemoryDom::ROOT, RECENT_ITEMS_BUTTON, "Recent");
        });
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    // The indicator never leaves; only the header control matters here.
    cy.wait_for_loader(true).await.unwrap();
}

#[tokio::test]
async fn test_command_timeout_override_applies_to_that_command_only() {
    let page = MemoryPage::with(|dom| {
        dom.after(Duration::from_millis(80), |dom| {
            dom.add_subj(MemoryDom::ROOT, "late", "here");
        });
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let short = cy.timeout(Duration::from_millis(20));
    assert!(matches!(
        short.get_by_test_id("late").await,
        Err(E2eError::Timeout { .. })
    ));
    cy.get_by_test_id("late").await.unwrap().should_have_text("here").await.unwrap();
}

fn date_picker(dom: &mut MemoryDom, appear_after: Option<Duration>) {
    let active = Arc::new(Mutex::new(None::<NodeId>));

    let build = move |dom: &mut MemoryDom| {
        let start = dom.add_subj(MemoryDom::ROOT, START_DATE_BUTTON, "Sep 1, 2015 @ 00:00:00.000");
        let end = dom.add_subj(MemoryDom::ROOT, END_DATE_BUTTON, "now");
        dom.add_subj(MemoryDom::ROOT, ABSOLUTE_TAB, "Absolute");
        let input = dom.add_input(MemoryDom::ROOT, ABSOLUTE_DATE_INPUT, "");
        dom.add_subj(MemoryDom::ROOT, QUERY_SUBMIT_BUTTON, "Update");

        let side = active.clone();
        dom.on_click(START_DATE_BUTTON, move |_, _| *side.lock() = Some(start));
        let side = active.clone();
        dom.on_click(END_DATE_BUTTON, move |_, _| *side.lock() = Some(end));
        let side = active.clone();
        dom.on(Selector::test_subj(ABSOLUTE_DATE_INPUT), Trigger::Enter, move |dom, _| {
            let typed = dom.value_of(input).unwrap_or_default().to_string();
            if let Some(button) = *side.lock() {
                dom.set_text(button, &typed);
            }
        });
    };

    match appear_after {
        Some(delay) => dom.after(delay, build),
        None => build(dom),
    }
}

#[tokio::test]
async fn test_top_nav_date_round_trip() {
    let page = MemoryPage::with(|dom| date_picker(dom, None));
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let start = "Sep 19, 2015 @ 06:31:44.000";
    let end = "Sep 23, 2015 @ 18:31:44.000";
    cy.set_top_nav_date(start, end, true).await.unwrap();

    let shown = cy.top_nav_date().await.unwrap();
    assert_eq!(shown.start, start);
    assert_eq!(shown.end, end);

    // nested commands run quiet
    let records = log.snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "setTopNavDate");
    assert_eq!(records[0].message, format!("Start: {start} :: End: {end}"));
}

#[tokio::test]
async fn test_set_top_nav_date_retries_while_picker_renders() {
    let page = MemoryPage::with(|dom| date_picker(dom, Some(Duration::from_millis(25))));
    let mut config = config(15);
    config.date_picker_retries = 8;
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let start = "Sep 19, 2015 @ 06:31:44.000";
    let end = "Sep 23, 2015 @ 18:31:44.000";
    cy.set_top_nav_date(start, end, false).await.unwrap();
    assert_eq!(cy.top_nav_date().await.unwrap().start, start);
}

#[tokio::test]
async fn test_set_top_nav_date_gives_up_after_bounded_retries() {
    let page = MemoryPage::new();
    let mut config = config(10);
    config.date_picker_retries = 2;
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let err = cy.set_top_nav_date("a", "b", false).await.unwrap_err();
    assert!(err.is_retryable());
}

fn console(dom: &mut MemoryDom) {
    let editor = dom.add(MemoryDom::ROOT, "div", &[("id", "ConAppEditor")], "GET _search");
    dom.set_style(editor, "font-size", "14px");
    dom.add_subj(MemoryDom::ROOT, SETTINGS_BUTTON, "Settings");
    let input = dom.add_input(MemoryDom::ROOT, FONT_SIZE_INPUT, "14");
    dom.set_displayed(input, false);
    dom.add_subj(MemoryDom::ROOT, SAVE_SETTINGS, "Save");

    dom.on_click(SETTINGS_BUTTON, move |dom, _| dom.set_displayed(input, true));
    dom.on_click(SAVE_SETTINGS, move |dom, _| {
        let size = dom.value_of(input).unwrap_or_default().to_string();
        dom.set_style(editor, "font-size", &format!("{size}px"));
        dom.set_displayed(input, false);
    });
}

#[tokio::test]
async fn test_console_font_size_round_trip() {
    let page = MemoryPage::with(console);
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    assert_eq!(cy.console_font_size().await.unwrap(), 14);

    cy.set_console_font_size(20).await.unwrap();
    assert_eq!(cy.console_font_size().await.unwrap(), 20);

    cy.set_console_font_size(24).await.unwrap();
    assert_eq!(cy.console_font_size().await.unwrap(), 24);

    let editor = cy.get(Selector::css(EDITOR)).await.unwrap();
    assert_eq!(editor.css_value("font-size").await.unwrap(), "24px");
}

fn filter_bar(dom: &mut MemoryDom) {
    dom.add_subj(MemoryDom::ROOT, ADD_FILTER, "+ Add filter");
    let editor = dom.add_subj(MemoryDom::ROOT, "filterEditorPopover", "");
    dom.set_displayed(editor, false);
    combo(dom, editor, FILTER_FIELD);
    combo(dom, editor, FILTER_OPERATOR);
    let params = combo(dom, editor, "filterParamsComboBox");
    dom.add_subj(editor, SAVE_FILTER, "Save");
    dom.add_subj(editor, CANCEL_FILTER, "Cancel");

    let edit_button = dom.add_subj(MemoryDom::ROOT, EDIT_FILTER, "Edit filter");
    dom.set_displayed(edit_button, false);

    dom.on_click(ADD_FILTER, move |dom, _| dom.set_displayed(editor, true));
    dom.on_click(CANCEL_FILTER, move |dom, _| dom.set_displayed(editor, false));
    dom.on_click(EDIT_FILTER, move |dom, _| {
        dom.set_displayed(edit_button, false);
        dom.set_displayed(editor, true);
    });
    dom.on_click(SAVE_FILTER, move |dom, _| {
        dom.set_displayed(editor, false);
        let field = dom.find_subj(FILTER_FIELD).map(|id| dom.text_of(id).to_string()).unwrap_or_default();
        let value = dom.text_of(params).to_string();
        let subj = format!("filter filter-enabled filter-key-{field} filter-value-{value}");
        dom.add_subj(MemoryDom::ROOT, &subj, &format!("{field}: {value}"));
        let indicator = dom.add_subj(MemoryDom::ROOT, LOADING_INDICATOR, "");
        dom.after(Duration::from_millis(10), move |dom| dom.remove(indicator));
    });
    dom.on(
        Selector::test_subj_contains("filter-key-"),
        Trigger::Click,
        move |dom, _| dom.set_displayed(edit_button, true),
    );
}

#[tokio::test]
async fn test_phrase_filter_pill_round_trip() {
    let page = MemoryPage::with(filter_bar);
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let pill = cy
        .submit_filter_from_dropdown("extension.raw", "is", "jpg")
        .await
        .unwrap();
    pill.should_have_text("extension.raw: jpg").await.unwrap();

    let filter = cy.read_filter("extension.raw").await.unwrap();
    assert_eq!(filter.label, "extension.raw: jpg");
    assert_eq!(filter.field, "extension.raw");
    assert_eq!(filter.operator, "is");
    assert_eq!(filter.value, "jpg");

    // editor closed again by cancel
    cy.wait_for_absent(Selector::test_subj(FILTER_FIELD)).await.unwrap();
}

fn discover(dom: &mut MemoryDom) {
    let input = dom.add_input(MemoryDom::ROOT, QUERY_INPUT, "");
    dom.add_subj(MemoryDom::ROOT, LANGUAGE_BUTTON, "DQL");
    let toggle = dom.add_subj(MemoryDom::ROOT, LANGUAGE_TOGGLE, "Lucene");
    dom.add_subj(MemoryDom::ROOT, QUERY_SUBMIT_BUTTON, "Refresh");

    dom.on_click(LANGUAGE_TOGGLE, move |dom, _| {
        if let Some(button) = dom.find_subj(LANGUAGE_BUTTON) {
            dom.set_text(button, "Lucene");
        }
        dom.set_displayed(toggle, false);
    });
    dom.on_click(QUERY_SUBMIT_BUTTON, move |dom, _| {
        dom.remove_subj(QUERY_HITS);
        let query = dom.value_of(input).unwrap_or_default().to_string();
        let indicator = dom.add_subj(MemoryDom::ROOT, LOADING_INDICATOR, "");
        dom.after(Duration::from_millis(15), move |dom| {
            dom.remove(indicator);
            let hits = if query == "Newsletter" { "1" } else { "14,004" };
            dom.add_subj(MemoryDom::ROOT, QUERY_HITS, &format!(" {hits} "));
        });
    });
}

#[tokio::test]
async fn test_query_for_newsletter_shows_one_hit() {
    let page = MemoryPage::with(discover);
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    cy.set_top_nav_query("Newsletter", true, None).await.unwrap();
    assert_eq!(cy.query_hits().await.unwrap(), "1");

    let names: Vec<String> = log.snapshot().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["setTopNavQuery"]);
}

#[tokio::test]
async fn test_query_language_switch() {
    let page = MemoryPage::with(discover);
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    cy.set_top_nav_query("extension:jpg", false, Some(QueryLanguage::Lucene))
        .await
        .unwrap();
    cy.get_by_test_id(LANGUAGE_BUTTON)
        .await
        .unwrap()
        .should_have_text("Lucene")
        .await
        .unwrap();
    // already on Lucene: no toggle click needed
    cy.set_query_language(QueryLanguage::Lucene).await.unwrap();
}

#[tokio::test]
async fn test_quiet_commands_flag_suppresses_records() {
    let page = MemoryPage::with(discover);
    let mut config = config(2_000);
    config.features.quiet_commands = true;
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    cy.set_top_nav_query("Newsletter", true, None).await.unwrap();
    assert!(log.is_empty());
}

/// Import flyout; `conflicts` confirmation dialogs follow the import click in conflict mode
fn import_flyout(dom: &mut MemoryDom, conflicts: u32, error_text: bool) {
    import_flyout_with_titles(dom, conflicts, error_text, &["[Logs] Web Traffic", "Unique Visitors"]);
}

fn import_flyout_with_titles(
    dom: &mut MemoryDom,
    conflicts: u32,
    error_text: bool,
    titles: &'static [&'static str],
) {
    dom.add_subj(MemoryDom::ROOT, IMPORT_OBJECTS, "Import");
    let flyout = dom.add_subj(MemoryDom::ROOT, IMPORT_FLYOUT, "");
    dom.set_displayed(flyout, false);
    dom.add(flyout, "input", &[("type", "file")], "");
    dom.add_subj(flyout, CREATE_NEW_COPIES, "Create new objects with random IDs");
    dom.add_subj(flyout, CHECK_CONFLICTS, "Check for existing objects");
    dom.add_subj(flyout, OVERWRITE_ENABLED, "Automatically overwrite conflicts");
    dom.add_subj(flyout, OVERWRITE_DISABLED, "Request action on conflict");
    dom.add_subj(flyout, IMPORT_BUTTON, "Import");

    let new_copies = Arc::new(Mutex::new(false));
    let remaining = Arc::new(Mutex::new(conflicts));

    let finish = move |dom: &mut MemoryDom, is_new: bool| {
        for title in titles {
            let row = dom.add_subj(flyout, RESULT_ROW, "");
            dom.add_subj(row, RESULT_TITLE, title);
            if is_new {
                dom.add_subj(row, NEW_BADGE, "New");
            }
        }
        if error_text {
            dom.add_subj(flyout, "importSavedObjectsErrors", "1 error: missing references");
        }
        dom.add_subj(flyout, DONE_BUTTON, "Done");
    };

    dom.on_click(IMPORT_OBJECTS, move |dom, _| dom.set_displayed(flyout, true));
    let mode = new_copies.clone();
    dom.on_click(CREATE_NEW_COPIES, move |_, _| *mode.lock() = true);
    let mode = new_copies.clone();
    dom.on_click(CHECK_CONFLICTS, move |_, _| *mode.lock() = false);

    let mode = new_copies.clone();
    let left = remaining.clone();
    dom.on_click(IMPORT_BUTTON, move |dom, _| {
        let is_new = *mode.lock();
        if is_new || *left.lock() == 0 {
            finish(dom, is_new);
        } else {
            dom.add_subj(MemoryDom::ROOT, CONFIRM_BUTTON, "Overwrite");
        }
    });

    let left = remaining.clone();
    dom.on_click(CONFIRM_BUTTON, move |dom, id| {
        dom.remove(id);
        let mut left = left.lock();
        *left = left.saturating_sub(1);
        if *left == 0 {
            finish(dom, false);
        } else {
            let again = dom.add_subj(MemoryDom::ROOT, CONFIRM_BUTTON, "Overwrite");
            dom.set_displayed(again, false);
            dom.after(Duration::from_millis(5), move |dom| dom.set_displayed(again, true));
        }
    });
    dom.on_click(DONE_BUTTON, move |dom, _| dom.set_displayed(flyout, false));
}

#[tokio::test]
async fn test_import_saved_objects_as_new_copies() {
    let page = MemoryPage::with(|dom| import_flyout(dom, 3, false));
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let mut options = ImportSavedObjects::new("saved_objects/logs_dashboard.ndjson");
    options.mode = ImportMode::CreateNewCopies;
    let report = cy.import_saved_objects(&options).await.unwrap();

    assert_eq!(report.confirmations, 0);
    assert_eq!(report.objects.len(), 2);
    assert!(report.objects.iter().all(|o| o.is_new));
    assert_eq!(
        page.dom().uploads(),
        &[Path::new("saved_objects/logs_dashboard.ndjson").to_path_buf()]
    );
    cy.wait_for_absent(Selector::test_subj(IMPORT_FLYOUT)).await.unwrap();
}

#[tokio::test]
async fn test_import_saved_objects_dismisses_each_confirmation() {
    let page = MemoryPage::with(|dom| import_flyout(dom, 3, false));
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let report = cy
        .import_saved_objects(&ImportSavedObjects::new("saved_objects/logs_dashboard.ndjson"))
        .await
        .unwrap();

    assert_eq!(report.confirmations, 3);
    assert_eq!(report.objects[0].title, "[Logs] Web Traffic");
    assert!(report.objects.iter().all(|o| !o.is_new));
}

#[tokio::test]
async fn test_import_confirmations_are_bounded() {
    let page = MemoryPage::with(|dom| import_flyout(dom, 50, false));
    let mut config = config(2_000);
    config.max_import_confirmations = 4;
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let err = cy
        .import_saved_objects(&ImportSavedObjects::new("x.ndjson"))
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::AssertionFailed(ref m) if m.contains("4")));
}

#[tokio::test]
async fn test_import_fails_on_error_text() {
    let page = MemoryPage::with(|dom| import_flyout(dom, 0, true));
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let err = cy
        .import_saved_objects(&ImportSavedObjects::new("x.ndjson"))
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::AssertionFailed(ref m) if m.contains("missing references")));
}

#[tokio::test]
async fn test_import_titles_mentioning_errors_are_not_failures() {
    let page = MemoryPage::with(|dom| {
        import_flyout_with_titles(dom, 0, false, &["[Logs] Error Rate by Host"])
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let mut options = ImportSavedObjects::new("x.ndjson");
    options.mode = ImportMode::CreateNewCopies;
    let report = cy.import_saved_objects(&options).await.unwrap();

    assert_eq!(report.objects.len(), 1);
    assert_eq!(report.objects[0].title, "[Logs] Error Rate by Host");
    assert!(report.objects[0].is_new);
}

#[tokio::test]
async fn test_panel_menu_chain() {
    let page = MemoryPage::with(|dom| {
        for title in ["Unique Visitors", "Bytes over time"] {
            let panel = dom.add_subj(MemoryDom::ROOT, "embeddablePanel", "");
            let header = dom.add(panel, "figcaption", &[], "");
            dom.add_subj(header, "dashboardPanelTitle", title);
            let toggle = dom.add_subj(header, "embeddablePanelToggleMenuIcon", "");
            let owner = title.to_string();
            dom.on(Selector::test_subj("embeddablePanelToggleMenuIcon"), Trigger::Click, move |dom, id| {
                if id != toggle || dom.find_subj("embeddablePanelContextMenuOpen").is_some() {
                    return;
                }
                let menu = dom.add_subj(MemoryDom::ROOT, "embeddablePanelContextMenuOpen", "");
                dom.add_subj(menu, "embeddablePanelAction-openInspector", "Inspect");
                dom.add_subj(menu, "embeddablePanelAction-togglePanel", "Maximize panel");
                dom.set_attr(menu, "data-owner", &owner);
            });
        }
        dom.on(
            Selector::test_subj("embeddablePanelAction-openInspector"),
            Trigger::Click,
            |dom, _| {
                let owner = dom
                    .find_all(&Selector::css("[data-owner]"))
                    .first()
                    .copied();
                if let Some(menu) = owner {
                    dom.remove(menu);
                }
                dom.add_subj(MemoryDom::ROOT, "inspectorPanel", "Data");
            },
        );
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let panel = cy.vis_panel_by_title("Unique Visitors").await.unwrap();
    let menu = cy.open_panel_menu(&panel).await.unwrap();
    menu.should_contain_text("Inspect").await.unwrap();
    assert_eq!(menu.attribute("data-owner").await.unwrap().as_deref(), Some("Unique Visitors"));

    cy.click_panel_menu_item("Inspect").await.unwrap();
    cy.get_by_test_id("inspectorPanel").await.unwrap();

    let names: Vec<String> = log.snapshot().into_iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        vec!["getVisPanelByTitle", "openVisContextMenu", "clickVisPanelMenuItem"]
    );
}

#[tokio::test]
async fn test_select_data_source() {
    let page = MemoryPage::with(|dom| {
        let button = dom.add_subj(MemoryDom::ROOT, "dataSourceSelectableButton", "Local cluster");
        let popover = dom.add_subj(MemoryDom::ROOT, "dataSourceSelectableContextMenuPopover", "");
        dom.set_displayed(popover, false);
        for title in ["Local cluster", "remote-logs"] {
            dom.add(popover, "li", &[("role", "option")], title);
        }
        dom.on_click("dataSourceSelectableButton", move |dom, _| dom.set_displayed(popover, true));
        dom.on(Selector::css(r#"[role="option"]"#), Trigger::Click, move |dom, id| {
            let title = dom.text_of(id).to_string();
            dom.set_text(button, &title);
            dom.set_displayed(popover, false);
        });
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    cy.select_data_source("remote-logs").await.unwrap();
    cy.get_by_test_id("dataSourceSelectableButton")
        .await
        .unwrap()
        .should_have_text("remote-logs")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_should_have_text_reports_last_seen_text() {
    let page = MemoryPage::with(|dom| {
        dom.add_subj(MemoryDom::ROOT, QUERY_HITS, "14,004");
    });
    let config = config(40);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let hits = cy.get_by_test_id(QUERY_HITS).await.unwrap();
    let err = hits.should_have_text("1").await.unwrap_err();
    assert!(matches!(err, E2eError::AssertionFailed(ref m) if m.contains("14,004")));
}

#[tokio::test]
async fn test_click_while_present_is_bounded() {
    let page = MemoryPage::with(|dom| {
        dom.add_subj(MemoryDom::ROOT, CONFIRM_BUTTON, "Confirm");
        dom.on_click(CONFIRM_BUTTON, |dom, id| {
            dom.remove(id);
            dom.add_subj(MemoryDom::ROOT, CONFIRM_BUTTON, "Confirm");
        });
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let clicks = cy
        .click_while_present(Selector::test_subj(CONFIRM_BUTTON), 5)
        .await
        .unwrap();
    assert_eq!(clicks, 5);
}

#[tokio::test]
async fn test_login_page_fills_and_submits() {
    let page = MemoryPage::with(|dom| {
        dom.on_visit("/app/login", |dom, _| {
            let user = dom.add_input(MemoryDom::ROOT, "user-name", "stale");
            let pass = dom.add_input(MemoryDom::ROOT, "password", "");
            dom.add_subj(MemoryDom::ROOT, "submit", "Log in");
            dom.on_click("submit", move |dom, _| {
                let ok = dom.value_of(user) == Some("admin") && dom.value_of(pass) == Some("secret");
                let indicator = dom.add_subj(MemoryDom::ROOT, LOADING_INDICATOR, "");
                dom.after(Duration::from_millis(10), move |dom| {
                    dom.remove(indicator);
                    if ok {
                        dom.add_subj(MemoryDom::ROOT, "homeApp", "Welcome");
                    }
                });
            });
        });
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);

    let credentials = Credentials {
        username: "admin".to_string(),
        password: "secret".to_string(),
    };
    LoginPage::new(cy).login(&credentials).await.unwrap();

    cy.get_by_test_id("homeApp").await.unwrap();
    assert!(page.dom().url().ends_with("/app/login"));
    let names: Vec<String> = log.snapshot().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["login", "visit"]);
}

#[tokio::test]
async fn test_add_sample_data_installs_once() {
    let page = MemoryPage::with(|dom| {
        let add = dom.add_subj(MemoryDom::ROOT, "addSampleDataSetlogs", "Add data");
        dom.on_click("addSampleDataSetlogs", move |dom, _| {
            dom.remove(add);
            dom.add_subj(MemoryDom::ROOT, "removeSampleDataSetlogs", "Remove");
        });
    });
    let config = config(2_000);
    let log = CommandLog::new();
    let cy = Commands::new(&page, &config, &log);
    let home = HomePage::new(cy);

    assert!(!home.sample_data_installed("logs").await.unwrap());
    home.add_sample_data("logs").await.unwrap();
    assert!(home.sample_data_installed("logs").await.unwrap());

    // second call finds it installed and does not look for the add button
    home.add_sample_data("logs").await.unwrap();
}
