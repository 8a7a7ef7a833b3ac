#![cfg(target_arch = "wasm32")]

use sg_mvvm::{scheduler, Element, InlineTemplates, Model, ModelClass, Registry, Value, View, ViewConfig, WebElement};
use std::sync::Once;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlElement, HtmlInputElement};

wasm_bindgen_test_configure!(run_in_browser);

fn setup(html: &str) -> WebElement {
	static LOG: Once = Once::new();
	LOG.call_once(tracing_wasm::set_as_global_default);

	let body = WebElement::body().unwrap();
	body.set_inner_html(html);
	body
}

#[wasm_bindgen_test]
fn click_and_input() {
	let body = setup(
		r#"<template id="counter"><button sg-click="increment">+</button><span sg-property="count"></span><input sg-property="name"></template>
		<section sg-model="Counter"></section>"#,
	);
	let class = ModelClass::builder("Counter")
		.default("count", 0)
		.default("name", "")
		.method("increment", |model, _| {
			let count = model.get("count").ok().and_then(|count| count.as_number()).unwrap_or_default();
			let _ = model.set("count", count + 1.0);
			Value::Null
		})
		.build();
	let model = Model::builder(&class).registry(Registry::new()).build().unwrap();
	let view = View::new(
		&model,
		ViewConfig::new().root(body.clone()).template("counter"),
		&InlineTemplates::new(body.clone()),
	);
	scheduler::flush();
	assert!(view.is_attached());

	let roots = view.roots();
	let button: HtmlElement = roots[0].0.clone().dyn_into().unwrap();
	button.click();
	button.click();
	assert_eq!(model.get("count").unwrap(), Value::from(2));
	assert_eq!(roots[1].inner_html(), "2");

	let input: HtmlInputElement = roots[2].0.clone().dyn_into().unwrap();
	input.set_value("Ferris");
	input.dispatch_event(&web_sys::Event::new("change").unwrap()).unwrap();
	assert_eq!(model.get("name").unwrap(), Value::from("Ferris"));

	model.destroy();
	assert!(body.find_by_attribute("sg-model", "Counter").unwrap().children().is_empty());
}

#[wasm_bindgen_test]
fn local_storage_auto_save() {
	setup("");
	let class = ModelClass::builder("WebPrefs")
		.default("theme", "light")
		.local_storage("web-prefs")
		.auto_save()
		.singleton()
		.build();
	let model = Model::builder(&class).registry(Registry::new()).build().unwrap();
	model.set("theme", "dark").unwrap();

	let storage = window().unwrap().local_storage().unwrap().unwrap();
	let saved = storage.get_item("web-prefs").unwrap().unwrap();
	assert_eq!(saved, r#"{"theme":"dark"}"#);

	model.destroy();
	let restored = Model::builder(&class).registry(Registry::new()).build().unwrap();
	assert_eq!(restored.get("theme").unwrap(), Value::from("dark"));
	storage.remove_item("web-prefs").unwrap();
}
