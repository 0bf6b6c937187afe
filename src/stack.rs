use std::fmt;
use std::sync::Arc;

use crate::{Client, Scope};

/// One entry of the hub's stack: a client reference paired with a scope.
///
/// The client is shared with whoever created it; the scope belongs to this
/// layer alone.
#[derive(Clone)]
pub struct Layer {
    /// The client captures are forwarded to, if any.
    pub client: Option<Arc<dyn Client>>,
    /// The context attached to captures made while this layer is on top.
    pub scope: Arc<Scope>,
    pub(crate) id: u64,
    pub(crate) mirrored: bool,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("client", &self.client.is_some())
            .field("scope", &self.scope)
            .field("id", &self.id)
            .finish()
    }
}

/// The layers of a hub.
///
/// The top layer is kept outside of `layers`, so a stack can never be empty.
/// Every layer gets an id that is unique within its stack.
#[derive(Debug)]
pub(crate) struct Stack {
    top: Layer,
    layers: Vec<Layer>,
    next_id: u64,
}

impl Stack {
    pub fn from_client_and_scope(client: Option<Arc<dyn Client>>, scope: Arc<Scope>) -> Stack {
        Stack {
            top: Layer {
                client,
                scope,
                id: 0,
                mirrored: false,
            },
            layers: vec![],
            next_id: 1,
        }
    }

    /// Pushes a layer with the current client and a fork of the current scope
    /// and returns the id of the new layer.
    pub fn push(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let layer = Layer {
            client: self.top.client.clone(),
            scope: Arc::new(self.top.scope.fork()),
            id,
            mirrored: false,
        };
        let parent = std::mem::replace(&mut self.top, layer);
        self.layers.push(parent);
        id
    }

    /// Pops the top layer unless it is the last one.
    pub fn pop(&mut self) -> bool {
        match self.layers.pop() {
            Some(parent) => {
                self.top = parent;
                true
            }
            None => false,
        }
    }

    #[inline(always)]
    pub fn top(&self) -> &Layer {
        &self.top
    }

    #[inline(always)]
    pub fn top_mut(&mut self) -> &mut Layer {
        &mut self.top
    }

    /// The number of layers, including the base layer.
    pub fn depth(&self) -> usize {
        self.layers.len() + 1
    }

    /// All layers from the base to the top.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().chain(std::iter::once(&self.top))
    }
}
