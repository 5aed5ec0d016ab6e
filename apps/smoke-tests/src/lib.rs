//! In-memory stand-ins for the host editor, used by the conformance suite.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;
use comfyui_sizepreview::{ExtensionRegistry, NodeHandle, SurfaceFactory, WidgetSource};

#[derive(Default)]
pub struct FakeWidgets {
    values: RefCell<HashMap<String, f64>>,
}

impl FakeWidgets {
    pub fn set(&self, label: &str, value: f64) {
        self.values.borrow_mut().insert(label.to_string(), value);
    }
}

impl WidgetSource for FakeWidgets {
    fn widget_value(&self, label: &str) -> Option<f64> {
        self.values.borrow().get(label).copied()
    }
}

#[derive(Debug, Clone)]
pub struct OpenedSurface {
    pub title: String,
    pub markup: String,
}

#[derive(Default)]
pub struct FakeSurfaces {
    pub opened: RefCell<Vec<OpenedSurface>>,
}

impl SurfaceFactory for FakeSurfaces {
    fn open_surface(&self, title: &str, markup: &str) -> Result<()> {
        self.opened.borrow_mut().push(OpenedSurface {
            title: title.to_string(),
            markup: markup.to_string(),
        });
        Ok(())
    }
}

pub struct FakeNode {
    pub node_type: String,
    pub widgets: Rc<FakeWidgets>,
    pub buttons: Vec<(String, Box<dyn Fn()>)>,
}

impl FakeNode {
    pub fn new(node_type: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            widgets: Rc::new(FakeWidgets::default()),
            buttons: Vec::new(),
        }
    }

    /// Simulates a click on the button with `label`; returns false if absent.
    pub fn click(&self, label: &str) -> bool {
        match self.buttons.iter().find(|(name, _)| name == label) {
            Some((_, on_click)) => {
                on_click();
                true
            }
            None => false,
        }
    }
}

impl NodeHandle for FakeNode {
    fn widgets(&self) -> Rc<dyn WidgetSource> {
        self.widgets.clone()
    }

    fn add_button(&mut self, label: &str, on_click: Box<dyn Fn()>) {
        self.buttons.push((label.to_string(), on_click));
    }
}

struct Registration {
    name: String,
    node_type: String,
    on_node_created: Box<dyn Fn(&mut dyn NodeHandle)>,
}

#[derive(Default)]
pub struct FakeRegistry {
    registrations: Vec<Registration>,
}

impl FakeRegistry {
    pub fn extension_names(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.name.as_str()).collect()
    }

    /// Creates a node and runs every creation hook registered for its type.
    pub fn create_node(&self, node_type: &str) -> FakeNode {
        let mut node = FakeNode::new(node_type);
        for registration in self.registrations.iter().filter(|r| r.node_type == node_type) {
            (registration.on_node_created)(&mut node);
        }
        node
    }
}

impl ExtensionRegistry for FakeRegistry {
    fn register_extension(&mut self, name: &str, node_type: &str, on_node_created: Box<dyn Fn(&mut dyn NodeHandle)>) {
        self.registrations.push(Registration {
            name: name.to_string(),
            node_type: node_type.to_string(),
            on_node_created,
        });
    }
}
