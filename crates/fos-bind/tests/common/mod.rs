//! Shared fixtures for the fos-bind integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use fos_bind::codec::encode;
use fos_bind::{ActionEvent, Application, Behavior, Context, Controller, Value};
use fos_dom::{Document, NodeId};

pub type Log = Rc<RefCell<Vec<String>>>;

/// Install a test subscriber once; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Document with `markup` appended to `<body>`
pub fn document(markup: &str) -> (Document, NodeId) {
    init_tracing();
    let mut doc = Document::default();
    let body = doc.body();
    doc.append_markup(body, markup).unwrap();
    (doc, body)
}

pub fn by_id(doc: &Document, id: &str) -> NodeId {
    doc.get_element_by_id(id).unwrap_or_else(|| panic!("no element #{id}"))
}

/// Controller that writes every callback to a shared log as
/// `identifier:event`
pub struct Recorder {
    log: Log,
    pub invocations: u32,
}

impl Recorder {
    pub fn new(log: Log) -> Self {
        Self { log, invocations: 0 }
    }

    fn push(&self, cx: &Context<'_>, entry: String) {
        self.log.borrow_mut().push(format!("{}:{}", cx.identifier(), entry));
    }
}

impl Controller for Recorder {
    fn initialize(&mut self, cx: &mut Context<'_>) -> anyhow::Result<()> {
        self.push(cx, "initialize".into());
        Ok(())
    }

    fn connect(&mut self, cx: &mut Context<'_>) -> anyhow::Result<()> {
        self.push(cx, "connect".into());
        Ok(())
    }

    fn disconnect(&mut self, cx: &mut Context<'_>) -> anyhow::Result<()> {
        self.push(cx, "disconnect".into());
        Ok(())
    }

    fn target_connected(&mut self, cx: &mut Context<'_>, name: &str, _target: NodeId) -> anyhow::Result<()> {
        self.push(cx, format!("+{name}"));
        Ok(())
    }

    fn target_disconnected(&mut self, cx: &mut Context<'_>, name: &str, _target: NodeId) -> anyhow::Result<()> {
        self.push(cx, format!("-{name}"));
        Ok(())
    }

    fn value_changed(
        &mut self,
        cx: &mut Context<'_>,
        key: &str,
        value: &Value,
        old: Option<&Value>,
    ) -> anyhow::Result<()> {
        let entry = match old {
            Some(old) => format!("{key}={} (was {})", encode(value), encode(old)),
            None => format!("{key}={}", encode(value)),
        };
        self.push(cx, entry);
        Ok(())
    }

    fn invoke(&mut self, cx: &mut Context<'_>, method: &str, event: &mut ActionEvent<'_>) -> anyhow::Result<()> {
        self.invocations += 1;
        match method {
            "greet" => {
                let input = cx.target("name")?;
                let name = cx.document().get_attribute(input, "value").unwrap_or_default().to_string();
                self.push(cx, format!("greet {name}"));
            }
            "fail" => anyhow::bail!("refused"),
            "boom" => panic!("exploded"),
            "unmark" => {
                let element = cx.element();
                cx.document_mut().remove_attribute(element, "data-controller")?;
                self.push(cx, "unmark".into());
            }
            other => {
                let params: Vec<String> = event.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                self.push(cx, format!("{other}({})", params.join(",")));
            }
        }
        Ok(())
    }
}

/// Recorder behavior logging into `log`
pub fn recorder(log: &Log) -> Behavior {
    let log = log.clone();
    Behavior::new(move || Recorder::new(log.clone()))
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Drain the log
pub fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

/// Started application with `behaviors` registered
pub fn started(doc: &mut Document, root: NodeId, behaviors: &[(&str, Behavior)]) -> Application {
    let mut app = Application::new();
    for (identifier, behavior) in behaviors {
        app.register(identifier, behavior).unwrap();
    }
    app.start(doc, root).unwrap();
    app
}
