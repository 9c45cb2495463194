// List rendering through the public client API against MemoryDocument.

use companion_client::{CompanionClient, ManualFrames, MemoryDocument, Reactive};
use serde_json::json;
use std::sync::Arc;

fn client_with(markup: &str) -> (CompanionClient, Arc<MemoryDocument>, Arc<ManualFrames>) {
    let doc = Arc::new(MemoryDocument::parse(markup));
    let frames = Arc::new(ManualFrames::new());
    let client = CompanionClient::default().with_document_and_frames(doc.clone(), frames.clone());
    (client, doc, frames)
}

#[test]
fn test_two_items_then_one() {
    let (client, doc, _) = client_with(r#"<div id="item">{{name}}</div>"#);

    client.render_list("item", json!([{"name": "A"}, {"name": "B"}]));
    assert_eq!(
        doc.to_html(),
        r#"<!--repeat:item:anchor--><div id="item-0">A</div><div id="item-1">B</div>"#
    );

    client.render_list("item", json!([{"name": "C"}]));
    assert_eq!(
        doc.to_html(),
        r#"<!--repeat:item:anchor--><div id="item-0">C</div>"#
    );
}

#[test]
fn test_reactive_scoreboard() {
    let (client, doc, frames) = client_with(
        r#"<table><tbody><tr id="row"><td>{{player.name}}</td><td>{{score}}</td></tr></tbody></table>"#,
    );
    let scores = Reactive::new(json!({
        "p1": {"player": {"name": "Ada"}, "score": 3},
        "p2": {"player": {"name": "Bob"}, "score": 1},
    }));

    let sub = client.render_list("row", &scores).unwrap();
    assert_eq!(doc.element_ids(), vec!["row-0", "row-1"]);
    assert_eq!(doc.inner_text("row-0").as_deref(), Some("Ada3"));

    scores.update(|v| v["p1"]["score"] = json!(4));
    scores.delete("p2");
    assert_eq!(frames.run_frame(), 1);

    assert_eq!(doc.element_ids(), vec!["row-0"]);
    assert_eq!(doc.inner_text("row-0").as_deref(), Some("Ada4"));

    sub.unsubscribe();
    scores.set("p3", json!({"player": {"name": "Cy"}, "score": 0}));
    assert_eq!(frames.pending_count(), 0);
}

#[test]
fn test_second_template_in_same_document() {
    let (client, doc, _) = client_with(
        r#"<ul><li id="a">{{self}}</li></ul><ol><li id="b">{{self}}</li></ol>"#,
    );
    client.render_list("a", json!(["x"]));
    client.render_list("b", json!(["y", "z"]));

    assert_eq!(doc.element_ids(), vec!["a-0", "b-0", "b-1"]);
    assert_eq!(doc.inner_text("b-1").as_deref(), Some("z"));
}
