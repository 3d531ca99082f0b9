//! Attribute Schema Parser
//!
//! Pure functions turning markup attribute text into structured records:
//! action descriptors, target/value/class/param attribute names.

use fos_dom::{to_camel_case, to_kebab_case, Event, KeyModifiers, ListenerOptions};

use crate::config::Schema;
use crate::error::BindingError;

/// Where an action's listener is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerTarget {
    /// The element carrying the action attribute
    #[default]
    Element,
    /// `@window`; the document node stands in for the window
    Window,
    /// `@document`
    Document,
}

/// Key filter of a keyboard action (`keydown.ctrl+s`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    /// Expected `KeyboardEvent.key`, compared case-insensitively
    pub key: String,
    pub modifiers: KeyModifiers,
}

/// Listener and invocation options of an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOptions {
    pub capture: bool,
    pub passive: bool,
    pub once: bool,
    /// Call `stop_propagation` before invoking
    pub stop: bool,
    /// Call `prevent_default` before invoking
    pub prevent: bool,
    /// Only invoke when the event target is the bound element itself
    pub self_only: bool,
}

/// Parsed `event->identifier#method` descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub event_name: String,
    pub listener_target: ListenerTarget,
    pub key_filter: Option<KeyFilter>,
    pub identifier: String,
    pub method_name: String,
    pub options: ActionOptions,
}

impl ActionDescriptor {
    pub fn listener_options(&self) -> ListenerOptions {
        ListenerOptions {
            capture: self.options.capture,
            once: self.options.once,
            passive: self.options.passive,
        }
    }

    /// Whether a keyboard event satisfies the key filter.
    /// Events without a key value are never filtered.
    pub fn matches_key(&self, event: &Event) -> bool {
        let (Some(filter), Some(key)) = (&self.key_filter, &event.key) else {
            return true;
        };
        filter.key.eq_ignore_ascii_case(key) && filter.modifiers == event.modifiers
    }
}

/// Default event for an element when a descriptor omits it
pub fn default_event_for(tag: &str, input_type: Option<&str>) -> Option<&'static str> {
    match tag {
        "a" | "button" => Some("click"),
        "details" => Some("toggle"),
        "form" => Some("submit"),
        "input" if input_type.is_some_and(|t| t.eq_ignore_ascii_case("submit")) => Some("click"),
        "input" | "textarea" => Some("input"),
        "select" => Some("change"),
        _ => None,
    }
}

/// Check controller identifier syntax (`hello`, `admin--user-list`)
pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier.starts_with(|c: char| c.is_ascii_alphanumeric())
        && identifier.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_valid_method(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn invalid(descriptor: &str, reason: impl Into<String>) -> BindingError {
    BindingError::InvalidActionSyntax {
        descriptor: descriptor.to_string(),
        reason: reason.into(),
    }
}

/// Parse one action descriptor.
///
/// Grammar: `[event["." keyFilter]["@" global] "->"] identifier "#" method [":" option]* ["(" option ("," option)* ")"]`.
/// `tag`/`input_type` describe the element carrying the attribute and feed
/// the default-event table when the event is omitted.
pub fn parse_action(
    text: &str,
    tag: &str,
    input_type: Option<&str>,
    schema: &Schema,
) -> Result<ActionDescriptor, BindingError> {
    let (event_part, rest) = match text.split_once("->") {
        Some((event, rest)) => (Some(event), rest),
        None => (None, text),
    };

    let (identifier, method_part) = rest
        .split_once('#')
        .ok_or_else(|| invalid(text, "missing `#method`"))?;
    if !is_valid_identifier(identifier) {
        return Err(invalid(text, format!("invalid identifier {identifier:?}")));
    }

    let mut option_tokens: Vec<&str> = Vec::new();
    let mut method_part = method_part;
    if let Some(open) = method_part.find('(') {
        let inner = method_part[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| invalid(text, "unterminated option list"))?;
        option_tokens.extend(inner.split(',').map(str::trim).filter(|t| !t.is_empty()));
        method_part = &method_part[..open];
    }
    let mut pieces = method_part.split(':');
    let method_name = pieces.next().unwrap_or_default();
    option_tokens.extend(pieces);
    if !is_valid_method(method_name) {
        return Err(invalid(text, format!("invalid method name {method_name:?}")));
    }

    let mut options = ActionOptions::default();
    for token in option_tokens {
        let (name, enabled) = match token.strip_prefix('!') {
            Some(name) => (name, false),
            None => (token, true),
        };
        match name {
            "capture" => options.capture = enabled,
            "once" => options.once = enabled,
            "passive" => options.passive = enabled,
            "stop" => options.stop = enabled,
            "prevent" => options.prevent = enabled,
            "self" => options.self_only = enabled,
            _ => return Err(invalid(text, format!("unknown option {token:?}"))),
        }
    }

    let (event_name, listener_target, key_filter) = match event_part {
        Some(event) => parse_event(text, event, schema)?,
        None => {
            let event = default_event_for(tag, input_type)
                .ok_or_else(|| invalid(text, format!("no default event for <{tag}>")))?;
            (event.to_string(), ListenerTarget::Element, None)
        }
    };

    Ok(ActionDescriptor {
        event_name,
        listener_target,
        key_filter,
        identifier: identifier.to_string(),
        method_name: method_name.to_string(),
        options,
    })
}

fn parse_event(
    text: &str,
    event: &str,
    schema: &Schema,
) -> Result<(String, ListenerTarget, Option<KeyFilter>), BindingError> {
    let (event, listener_target) = match event.rsplit_once('@') {
        Some((event, "window")) => (event, ListenerTarget::Window),
        Some((event, "document")) => (event, ListenerTarget::Document),
        Some((_, other)) => return Err(invalid(text, format!("unknown global target {other:?}"))),
        None => (event, ListenerTarget::Element),
    };

    let (event_name, filter) = match event.split_once('.') {
        Some((name, filter)) if name.starts_with("key") => (name, Some(filter)),
        _ => (event, None),
    };
    if event_name.is_empty() {
        return Err(invalid(text, "empty event name"));
    }

    let key_filter = filter
        .map(|filter| parse_key_filter(text, filter, schema))
        .transpose()?;
    Ok((event_name.to_string(), listener_target, key_filter))
}

fn parse_key_filter(text: &str, filter: &str, schema: &Schema) -> Result<KeyFilter, BindingError> {
    let mut parts: Vec<&str> = filter.split('+').collect();
    let key_name = parts.pop().unwrap_or_default();
    let mut modifiers = KeyModifiers::default();
    for modifier in parts {
        match modifier {
            "ctrl" => modifiers.ctrl = true,
            "alt" => modifiers.alt = true,
            "shift" => modifiers.shift = true,
            "meta" => modifiers.meta = true,
            _ => return Err(invalid(text, format!("unknown modifier {modifier:?}"))),
        }
    }
    let key = schema
        .key_for(key_name)
        .ok_or_else(|| invalid(text, format!("unknown key filter {key_name:?}")))?;
    Ok(KeyFilter { key: key.to_string(), modifiers })
}

/// Parse every whitespace-separated descriptor of an action attribute.
/// Each entry keeps its source text; failures do not affect siblings.
pub fn parse_action_list<'a>(
    text: &'a str,
    tag: &str,
    input_type: Option<&str>,
    schema: &Schema,
) -> Vec<(&'a str, Result<ActionDescriptor, BindingError>)> {
    text.split_ascii_whitespace()
        .map(|token| (token, parse_action(token, tag, input_type, schema)))
        .collect()
}

/// `data-{identifier}-target`
pub fn target_attribute(identifier: &str) -> String {
    format!("data-{identifier}-target")
}

/// `data-{identifier}-{key}-value`, key kebab-cased
pub fn value_attribute(identifier: &str, key: &str) -> String {
    format!("data-{identifier}-{}-value", to_kebab_case(key))
}

/// `data-{identifier}-{name}-class`, name kebab-cased
pub fn class_attribute(identifier: &str, name: &str) -> String {
    format!("data-{identifier}-{}-class", to_kebab_case(name))
}

/// `data-{identifier}-{name}-param`, name kebab-cased
pub fn param_attribute(identifier: &str, name: &str) -> String {
    format!("data-{identifier}-{}-param", to_kebab_case(name))
}

/// Param name (camelCase) if `attribute` is a param attribute of `identifier`
pub fn param_name(identifier: &str, attribute: &str) -> Option<String> {
    let middle = attribute
        .strip_prefix("data-")?
        .strip_prefix(identifier)?
        .strip_prefix('-')?
        .strip_suffix("-param")?;
    (!middle.is_empty()).then(|| to_camel_case(middle))
}

/// Whether `attribute` is some controller's target attribute
pub fn is_target_attribute(attribute: &str) -> bool {
    attribute.starts_with("data-") && attribute.ends_with("-target")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, tag: &str) -> Result<ActionDescriptor, BindingError> {
        parse_action(text, tag, None, &Schema::default())
    }

    #[test]
    fn test_full_descriptor() {
        let action = parse("click->hello#greet", "div").unwrap();
        assert_eq!(action.event_name, "click");
        assert_eq!(action.identifier, "hello");
        assert_eq!(action.method_name, "greet");
        assert_eq!(action.options, ActionOptions::default());
        assert_eq!(action.listener_target, ListenerTarget::Element);
    }

    #[test]
    fn test_default_events() {
        assert_eq!(parse("hello#greet", "button").unwrap().event_name, "click");
        assert_eq!(parse("hello#greet", "a").unwrap().event_name, "click");
        assert_eq!(parse("hello#greet", "form").unwrap().event_name, "submit");
        assert_eq!(parse("hello#greet", "details").unwrap().event_name, "toggle");
        assert_eq!(parse("hello#greet", "select").unwrap().event_name, "change");
        assert_eq!(parse("hello#greet", "textarea").unwrap().event_name, "input");
        assert_eq!(parse("hello#greet", "input").unwrap().event_name, "input");
        let submit = parse_action("hello#greet", "input", Some("submit"), &Schema::default()).unwrap();
        assert_eq!(submit.event_name, "click");
        assert!(matches!(parse("hello#greet", "div"), Err(BindingError::InvalidActionSyntax { .. })));
    }

    #[test]
    fn test_options_both_forms() {
        let colon = parse("click->c#m:once:!passive:capture", "div").unwrap();
        assert!(colon.options.once && colon.options.capture && !colon.options.passive);

        let parens = parse("click->c#m(once, prevent, self)", "div").unwrap();
        assert_eq!(parens.method_name, "m");
        assert!(parens.options.once && parens.options.prevent && parens.options.self_only);

        assert!(parse("click->c#m(bogus)", "div").is_err());
        assert!(parse("click->c#m(once", "div").is_err());
    }

    #[test]
    fn test_key_filters_and_globals() {
        let action = parse("keydown.ctrl+s@window->editor#save", "div").unwrap();
        assert_eq!(action.event_name, "keydown");
        assert_eq!(action.listener_target, ListenerTarget::Window);
        let filter = action.key_filter.clone().unwrap();
        assert_eq!(filter.key, "s");
        assert!(filter.modifiers.ctrl && !filter.modifiers.shift);

        let ctrl = KeyModifiers { ctrl: true, ..Default::default() };
        assert!(action.matches_key(&Event::keyboard("keydown", "S", ctrl)));
        assert!(!action.matches_key(&Event::keyboard("keydown", "s", KeyModifiers::default())));
        assert!(!action.matches_key(&Event::keyboard("keydown", "a", ctrl)));

        assert!(parse("keyup.hyper->c#m", "div").is_err());
        assert!(parse("keyup.super+a->c#m", "div").is_err());
        assert!(parse("resize@body->c#m", "div").is_err());
        // Dots only carry filters on keyboard events
        assert_eq!(parse("turbo.load->c#m", "div").unwrap().event_name, "turbo.load");
    }

    #[test]
    fn test_malformed() {
        for text in ["click->hello", "click->#greet", "click->hello#", "->hello#greet", "click->he llo#x", "c#1m"] {
            assert!(parse(text, "div").is_err(), "{text} should be rejected");
        }
    }

    #[test]
    fn test_action_list_isolates_failures() {
        let list = parse_action_list("hello#greet bad c#m", "button", None, &Schema::default());
        assert_eq!(list.len(), 3);
        assert!(list[0].1.is_ok());
        assert_eq!(list[1].0, "bad");
        assert!(list[1].1.is_err());
        assert!(list[2].1.is_ok());
    }

    #[test]
    fn test_attribute_names() {
        assert_eq!(target_attribute("hello"), "data-hello-target");
        assert_eq!(value_attribute("c", "count"), "data-c-count-value");
        assert_eq!(value_attribute("c", "pageSize"), "data-c-page-size-value");
        assert_eq!(class_attribute("c", "activeItem"), "data-c-active-item-class");
        assert_eq!(param_attribute("c", "itemId"), "data-c-item-id-param");
        assert_eq!(param_name("c", "data-c-item-id-param"), Some("itemId".to_string()));
        assert_eq!(param_name("c", "data-cc-id-param"), None);
        assert_eq!(param_name("c", "data-c--param"), None);
        assert!(is_target_attribute("data-c-target"));
        assert!(!is_target_attribute("data-c-count-value"));
    }
}
