use core::cell::RefCell;
use pretty_assertions::assert_eq;
use sg_mvvm::{
	scheduler,
	view::{item_hash, template::Done},
	Element, Error, Flags, InlineTemplates, MemoryElement, Model, ModelClass, Registry, TemplateSource, TypeTag, Value, View, ViewConfig,
};
use std::rc::Rc;

fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("sg_mvvm=trace").try_init();
}

fn build(class: &Rc<ModelClass>) -> Model {
	Model::builder(class).registry(Registry::new()).build().unwrap()
}

fn attach(model: &Model, page: &MemoryElement, config: ViewConfig<MemoryElement>) -> View<MemoryElement> {
	let view = View::new(model, config.root(page.clone()).debug_markers(true), &InlineTemplates::new(page.clone()));
	scheduler::flush();
	view
}

fn by_attribute(root: &MemoryElement, attribute: &str, value: &str) -> MemoryElement {
	root.find_by_attribute(attribute, value)
		.unwrap_or_else(|| panic!("no {}={:?}", attribute, value))
}

#[test]
fn two_way_properties() {
	init_logging();
	let page = MemoryElement::parse(
		r#"<template id="form"><input sg-property="name"><p sg-property="name"></p><input type="checkbox" sg-property="done"><input type="range" sg-property="level"><span sg-property="price" sg-format="money"></span></template>
		<main sg-model="Form"></main>"#,
	);
	let class = ModelClass::builder("Form")
		.default("name", "Ann")
		.default("done", false)
		.default("level", 3)
		.default("price", 3.5)
		.method("money", |_, args| Value::from(format!("{:.2} €", args[0].as_number().unwrap_or_default())))
		.build();
	let model = build(&class);
	let view = attach(&model, &page, ViewConfig::new().template("form"));
	assert!(view.is_attached());
	assert_eq!(view.error(), None);

	let roots = view.roots();
	assert_eq!(roots.len(), 5);
	let (text, paragraph, checkbox, range, price) = (&roots[0], &roots[1], &roots[2], &roots[3], &roots[4]);
	assert!(roots.iter().all(|root| root.get_attribute("sg-uuid").as_deref() == Some(model.uuid())));
	assert!(view.container().unwrap().same_node(&by_attribute(&page, "sg-model", "Form")));

	assert_eq!(text.value(), "Ann");
	assert_eq!(paragraph.inner_html(), "Ann");
	assert_eq!(price.text_content(), "3.50 €");

	text.input("Bob");
	assert_eq!(model.get("name").unwrap(), Value::from("Bob"));
	assert_eq!(paragraph.inner_html(), "Bob");

	model.set("name", "Cy").unwrap();
	assert_eq!(text.value(), "Cy");

	checkbox.toggle();
	assert_eq!(model.get("done").unwrap(), Value::from(true));
	model.set("done", false).unwrap();
	assert!(!checkbox.checked());

	range.input("7");
	assert_eq!(model.get("level").unwrap(), Value::from(7));

	// Rejected input leaves the model alone.
	range.input("seven");
	assert_eq!(model.get("level").unwrap(), Value::from(7));
}

#[test]
fn expressions_css_and_attributes() {
	let page = MemoryElement::parse(
		r#"<main sg-model="Card">
			<div class="card" sg-css="{ active: selected, big: size > 2 }" sg-attributes="{ title: label, 'data-size': size, hidden: !visible }">
				<span sg-value="label + '!'"></span>
				<i sg-css="kind"></i>
				<b sg-css="bogus + 1"></b>
			</div>
		</main>"#,
	);
	let class = ModelClass::builder("Card")
		.default("selected", false)
		.default("size", 1)
		.default("label", "Hi")
		.default("visible", true)
		.method("kind", |model, _| {
			if model.get("selected").map_or(false, |selected| selected.is_truthy()) {
				Value::from("on")
			} else {
				Value::from("off")
			}
		})
		.build();
	let model = build(&class);
	let _view = attach(&model, &page, ViewConfig::new());

	let container = by_attribute(&page, "sg-model", "Card");
	assert_eq!(container.get_attribute("sg-uuid").as_deref(), Some(model.uuid()));
	let card = container.children()[0].clone();
	let [span, icon, bogus] = [0, 1, 2].map(|i| card.children()[i].clone());

	assert_eq!(card.class_names(), ["card"]);
	assert_eq!(card.get_attribute("title").as_deref(), Some("Hi"));
	assert_eq!(card.get_attribute("data-size").as_deref(), Some("1"));
	assert!(!card.has_attribute("hidden"));
	assert_eq!(span.inner_html(), "Hi!");
	assert_eq!(icon.class_names(), ["off"]);
	// Unknown identifiers are rejected, not evaluated.
	assert!(bogus.class_names().is_empty());

	model.set("selected", true).unwrap();
	assert_eq!(card.class_names(), ["card", "active"]);
	assert_eq!(icon.class_names(), ["on"]);
	model.set("size", 3).unwrap();
	assert_eq!(card.class_names(), ["card", "active", "big"]);
	model.set("selected", false).unwrap();
	assert_eq!(card.class_names(), ["card", "big"]);

	// Attributes and values render once.
	model.set("label", "Bye").unwrap();
	assert_eq!(card.get_attribute("title").as_deref(), Some("Hi"));
	assert_eq!(span.inner_html(), "Hi!");
}

#[test]
fn dropdowns() {
	let page = MemoryElement::parse(
		r#"<main sg-model="Picker"><div sg-property="color" sg-type="dropdown"><span sg-dropdown></span><ul><li sg-option="red">Red</li><li sg-option="blue">Blue</li></ul></div></main>"#,
	);
	let class = ModelClass::builder("Picker").default("color", "red").build();
	let model = build(&class);
	let _view = attach(&model, &page, ViewConfig::new());

	let display = by_attribute(&page, "sg-dropdown", "");
	let red = by_attribute(&page, "sg-option", "red");
	let blue = by_attribute(&page, "sg-option", "blue");
	assert_eq!(display.inner_html(), "Red");
	assert_eq!(red.class_names(), ["selected"]);

	blue.dispatch("click");
	assert_eq!(model.get("color").unwrap(), Value::from("blue"));
	assert_eq!(display.inner_html(), "Blue");
	assert!(red.class_names().is_empty());
	assert_eq!(blue.class_names(), ["selected"]);
}

#[test]
fn select_options() {
	let page = MemoryElement::parse(r#"<main sg-model="Choice"><select sg-property="choice" sg-options="choices"></select></main>"#);
	let class = ModelClass::builder("Choice")
		.default("choices", Value::array(["a", "b", "c"]))
		.default("choice", "b")
		.build();
	let model = build(&class);
	let _view = attach(&model, &page, ViewConfig::new());

	let select = by_attribute(&page, "sg-options", "choices");
	assert_eq!(select.children().len(), 3);
	assert_eq!(select.value(), "b");

	model.set("choice", "c").unwrap();
	assert_eq!(select.value(), "c");

	select.input("a");
	assert_eq!(model.get("choice").unwrap(), Value::from("a"));

	model.add_to("choices", "d", None, Flags::empty()).unwrap();
	assert_eq!(select.children().len(), 4);
	assert_eq!(select.value(), "a");
}

fn rows_class() -> Rc<ModelClass> {
	ModelClass::builder("Rows")
		.typed("rows", Vec::<Value>::new(), TypeTag::Array)
		.default("count", 2)
		.default("picked", "")
		.method("pick", |model, args| {
			let name = args.first().and_then(|item| item.field("name")).unwrap_or_default();
			let index = args.get(1).cloned().unwrap_or_default();
			let _ = model.set("picked", format!("{}@{}", name, index));
			Value::Null
		})
		.build()
}

fn row(id: i32, name: &str) -> Value {
	Value::object([("id", Value::from(id)), ("name", Value::from(name))])
}

const ROWS_PAGE: &str = r#"<template id="row"><li class="row" sg-click="pick"><b>$name</b> #$index of $total <button sg-click="remove">x</button></li></template>
<main sg-model="Rows"><ul sg-for="rows" sg-template="row" sg-item-variables="{ total: count }"></ul></main>"#;

#[test]
fn lists_render_and_resolve_items() {
	init_logging();
	let page = MemoryElement::parse(ROWS_PAGE);
	let class = rows_class();
	let model = Model::builder(&class)
		.registry(Registry::new())
		.property("rows", Value::array([row(1, "Ann"), row(2, "<Bob>")]))
		.build()
		.unwrap();
	let removed = Rc::new(RefCell::new(Vec::new()));
	let config = {
		let removed = Rc::clone(&removed);
		ViewConfig::new().handler("remove", move |view: &View<MemoryElement>, event| {
			let item = view.get_for_item(&event.target).unwrap();
			removed.borrow_mut().push(item.hash.clone());
			view.model().remove_from("rows", item.index, Flags::empty()).unwrap();
		})
	};
	let view = attach(&model, &page, config);

	let list = by_attribute(&page, "sg-for", "rows");
	let items = list.children();
	assert_eq!(items.len(), 2);
	assert_eq!(items[0].text_content(), "Ann #0 of 2 x");
	assert_eq!(items[1].text_content(), "<Bob> #1 of 2 x");
	let hashes: Vec<String> = items.iter().map(|item| item.get_attribute("sg-item").unwrap()).collect();
	assert_eq!(hashes[0], item_hash(model.uuid(), "rows", &row(1, "Ann"), 0));
	assert!(hashes[1].starts_with("id:2:"));

	let bold = items[1].children()[0].clone();
	let item = view.get_for_item(&bold).unwrap();
	assert_eq!(item.index, 1);
	assert_eq!(item.key, Value::from(1));
	assert_eq!(item.hash, hashes[1]);
	assert_eq!(item.value.field("name"), Some(Value::from("<Bob>")));

	// Clicks inside an item pass its value and index.
	bold.dispatch("click");
	assert_eq!(model.get("picked").unwrap(), Value::from("<Bob>@1"));

	// Reordering re-renders with the same hash per logical item.
	model.set("rows", Value::array([row(2, "<Bob>"), row(1, "Ann")])).unwrap();
	let reordered: Vec<String> = list.children().iter().map(|item| item.get_attribute("sg-item").unwrap()).collect();
	assert_eq!(reordered, [hashes[1].clone(), hashes[0].clone()]);

	model.set("count", 5).unwrap();
	assert_eq!(list.children()[0].text_content(), "<Bob> #0 of 5 x");

	let button = list.children()[1].children()[1].clone();
	button.dispatch("click");
	assert_eq!(*removed.borrow(), [hashes[0].clone()]);
	assert_eq!(list.children().len(), 1);
	assert_eq!(model.size("rows").unwrap(), 1);
}

#[test]
fn missing_list_template_shows_an_error() {
	let page = MemoryElement::parse(r#"<main sg-model="Rows"><ul sg-for="rows" sg-template="nope"></ul></main>"#);
	let model = build(&rows_class());
	let _view = attach(&model, &page, ViewConfig::new());
	let list = by_attribute(&page, "sg-for", "rows");
	assert_eq!(list.children()[0].get_attribute("class").as_deref(), Some("sg-error"));
	assert!(list.text_content().contains("nope"));
}

#[test]
fn missing_template_shows_an_error() {
	let page = MemoryElement::parse(r#"<main sg-model="Form"></main>"#);
	let class = ModelClass::builder("Form").default("name", "").build();
	let model = build(&class);
	let view = attach(&model, &page, ViewConfig::new().template("missing"));

	assert!(!view.is_attached());
	assert_eq!(view.error(), Some(Error::MissingTemplate("missing".to_owned())));
	let container = by_attribute(&page, "sg-model", "Form");
	assert_eq!(container.children()[0].get_attribute("class").as_deref(), Some("sg-error"));
	assert!(container.text_content().contains("missing"));
}

#[test]
fn missing_container() {
	let page = MemoryElement::parse("<main></main>");
	let class = ModelClass::builder("Homeless").build();
	let model = build(&class);
	let view = attach(&model, &page, ViewConfig::new());
	assert!(matches!(view.error(), Some(Error::MissingContainer(_))));
}

/// Resolves templates only when told to.
#[derive(Default)]
struct Manual {
	pending: RefCell<Vec<(String, Done)>>,
}

impl TemplateSource for Manual {
	fn load(&self, name: &str, done: Done) {
		self.pending.borrow_mut().push((name.to_owned(), done));
	}
}

#[test]
fn views_attach_in_construction_order() {
	let page = MemoryElement::parse(r#"<main sg-model="Slow"></main><main sg-model="Fast"></main>"#);
	let slow = build(&ModelClass::builder("Slow").build());
	let fast = build(&ModelClass::builder("Fast").build());
	let order = Rc::new(RefCell::new(Vec::new()));
	let config = |order: &Rc<RefCell<Vec<String>>>| {
		let order = Rc::clone(order);
		ViewConfig::new()
			.root(page.clone())
			.on_attached(move |view: &View<MemoryElement>| order.borrow_mut().push(view.model().class_name().to_owned()))
	};

	let source = Manual::default();
	let slow_view = View::new(&slow, config(&order).template("slow"), &source);
	let fast_view = View::new(&fast, config(&order), &source);
	scheduler::flush();
	assert!(order.borrow().is_empty());
	assert!(!fast_view.is_attached());

	for (_, done) in source.pending.take() {
		done(Ok("<p>slow</p>".to_owned()));
	}
	scheduler::flush();
	assert_eq!(*order.borrow(), ["Slow", "Fast"]);
	assert_eq!(slow_view.roots()[0].inner_html(), "slow");
	assert!(fast_view.is_attached());
}

#[test]
fn writes_before_attaching_are_rendered() {
	let page = MemoryElement::parse(r#"<main sg-model="Early"><input sg-property="name"></main>"#);
	let class = ModelClass::builder("Early").default("name", "").build();
	let model = build(&class);
	let view = View::new(&model, ViewConfig::new().root(page.clone()), &InlineTemplates::new(page.clone()));
	model.set("name", "set early").unwrap();
	assert_eq!(model.deferred_properties(), ["name"]);
	scheduler::flush();
	assert!(view.is_attached());
	assert!(model.deferred_properties().is_empty());
	assert_eq!(by_attribute(&page, "sg-property", "name").value(), "set early");
}

#[test]
fn rebinding_replaces_listeners() {
	let page = MemoryElement::parse(r#"<main sg-model="Again"><input sg-property="name"></main>"#);
	let class = ModelClass::builder("Again").default("name", "a").build();
	let model = build(&class);
	let view = attach(&model, &page, ViewConfig::new());
	let input = by_attribute(&page, "sg-property", "name");

	view.rebind();
	view.rebind();
	assert_eq!(input.dispatch("change"), 1);
	assert_eq!(model.off(Some("name"), None), 1);
}

#[test]
fn css_classes_after_rebinding() {
	let page = MemoryElement::parse(
		r#"<main sg-model="Tile">
			<div class="card" sg-css="{ active: selected }"></div>
			<div sg-css="{ big: isBig() }"></div>
		</main>"#,
	);
	let class = ModelClass::builder("Tile")
		.default("selected", true)
		.default("size", 1)
		.method("isBig", |model, _| {
			Value::Boolean(model.get("size").ok().and_then(|size| size.as_number()).unwrap_or_default() > 2.0)
		})
		.build();
	let model = build(&class);
	let view = attach(&model, &page, ViewConfig::new());
	let container = by_attribute(&page, "sg-model", "Tile");
	let [card, tile] = [0, 1].map(|i| container.children()[i].clone());
	assert_eq!(card.class_names(), ["card", "active"]);
	assert!(tile.class_names().is_empty());

	view.rebind();
	assert_eq!(card.class_names(), ["card", "active"]);
	model.set("selected", false).unwrap();
	assert_eq!(card.class_names(), ["card"]);

	// Method calls may read any property.
	model.set("size", 5).unwrap();
	assert_eq!(tile.class_names(), ["big"]);
	model.set("size", 0).unwrap();
	assert!(tile.class_names().is_empty());
}

#[test]
fn destroying_the_instance_detaches() {
	let page = MemoryElement::parse(r#"<template id="t"><p sg-property="name"></p></template><main sg-model="Doomed"></main>"#);
	let class = ModelClass::builder("Doomed").default("name", "x").build();
	let model = build(&class);
	let view = attach(&model, &page, ViewConfig::new().template("t"));
	let container = by_attribute(&page, "sg-model", "Doomed");
	assert_eq!(container.children().len(), 1);

	model.destroy();
	assert!(!view.is_attached());
	assert!(container.children().is_empty());
	assert!(view.roots().is_empty());
}

#[test]
fn templates_load_once_per_class() {
	let page = MemoryElement::parse(r#"<template id="t"><p sg-property="n"></p></template><div id="a"></div><div id="b"></div>"#);
	let class = ModelClass::builder("Shared").default("n", 1).build();
	let source = Manual::default();
	let views: Vec<View<MemoryElement>> = ["a", "b"]
		.iter()
		.map(|id| View::new(&build(&class), ViewConfig::new().container(by_attribute(&page, "id", id)).template("t"), &source))
		.collect();
	assert_eq!(source.pending.borrow().len(), 1);
	let template = InlineTemplates::new(page.clone());
	for (name, done) in source.pending.take() {
		done(template.find(&name));
	}
	scheduler::flush();
	assert!(views.iter().all(View::is_attached));
	assert_eq!(by_attribute(&page, "id", "b").children()[0].inner_html(), "1");
}
