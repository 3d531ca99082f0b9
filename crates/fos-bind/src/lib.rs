//! fOS Bind - attribute-driven controller runtime
//!
//! Attaches behavior to live [`fos_dom`] elements through markup attributes:
//!
//! - `data-controller="hello"` creates a `hello` instance for the element
//! - `data-action="click->hello#greet"` routes events to controller methods
//! - `data-hello-target="name"` marks elements the controller looks up
//! - `data-hello-count-value="3"` carries typed values
//! - `data-hello-active-class="on"` names CSS classes
//!
//! # Example
//!
//! ```
//! use fos_bind::{ActionEvent, Application, Behavior, Context, Controller};
//! use fos_dom::{Document, Event};
//!
//! #[derive(Default)]
//! struct Hello {
//!     greeted: Option<String>,
//! }
//!
//! impl Controller for Hello {
//!     fn invoke(&mut self, cx: &mut Context<'_>, method: &str, _event: &mut ActionEvent<'_>) -> anyhow::Result<()> {
//!         if method == "greet" {
//!             let input = cx.target("name")?;
//!             self.greeted = cx.document().get_attribute(input, "value").map(str::to_string);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut doc = Document::default();
//! let body = doc.body();
//! doc.append_markup(body, r#"
//!     <div id="hello" data-controller="hello">
//!         <input data-hello-target="name" value="Ada">
//!         <button id="greet" data-action="hello#greet">Greet</button>
//!     </div>
//! "#).unwrap();
//!
//! let mut app = Application::new();
//! app.register("hello", &Behavior::new(Hello::default).target("name").method("greet")).unwrap();
//! app.start(&mut doc, body).unwrap();
//!
//! let button = doc.get_element_by_id("greet").unwrap();
//! app.dispatch_event(&mut doc, button, &mut Event::new("click"));
//!
//! let element = doc.get_element_by_id("hello").unwrap();
//! let hello = app.controller::<Hello>(element, "hello").unwrap();
//! assert_eq!(hello.greeted.as_deref(), Some("Ada"));
//! ```

pub mod application;
pub mod codec;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod instance;
pub mod parser;
pub mod registry;
pub mod scope;

pub use application::Application;
pub use codec::{Value, ValueType};
pub use config::{Config, Schema};
pub use controller::{ActionEvent, Context, Controller, ValueEntry};
pub use dispatcher::{Batch, Instruction, LiveEntry, reconcile};
pub use error::{ApplicationError, BindingError, Diagnostic, RegistrationError, Severity};
pub use instance::{InstanceKey, LifecycleState};
pub use parser::{ActionDescriptor, ActionOptions, KeyFilter, ListenerTarget};
pub use registry::{Behavior, Definition, Registry};
