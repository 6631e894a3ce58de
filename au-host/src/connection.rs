//! Wiring units into a processing graph

use crate::{
    error::{Error, Result, Status},
    factory::NativeResult,
    graph::{AudioGraph, GraphContext, NodeId},
    unit::{AudioUnit, GraphMembership},
};
use log::{debug, warn};

impl AudioUnit {
    /// Feed `source`'s output bus `source_bus` into this unit's input bus `dest_bus`.
    ///
    /// Units that are not yet part of `graph` get a node there. If the graph
    /// rejects the edge, nodes added by this call are removed again and no
    /// partial edge remains.
    pub fn connect_input(
        &mut self,
        graph: &GraphContext,
        dest_bus: u32,
        source: &mut AudioUnit,
        source_bus: u32,
    ) -> Result<()> {
        let result = self.connect_input_inner(graph, dest_bus, source, source_bus);
        source.tracker().record(&result);
        self.record(result)
    }

    /// Remove whatever edge ends at input bus `dest_bus`; succeeds if there is none
    pub fn disconnect_input(&mut self, graph: &GraphContext, dest_bus: u32) -> Result<()> {
        let node = self.node_in(graph);
        let result = graph.with_graph(|g| match node {
            None => Ok(()),
            Some(node) => g.disconnect(node, dest_bus).and_then(|_| g.update()),
        });
        let result = match result {
            Ok(Ok(())) => {
                debug!("{}: input {} disconnected", self.descriptor(), dest_bus);
                Ok(())
            }
            Ok(Err(status)) => Err(Error::ConnectFailed(status)),
            Err(e) => Err(e),
        };
        self.record(result)
    }

    fn node_in(&self, graph: &GraphContext) -> Option<NodeId> {
        self.membership
            .as_ref()
            .filter(|m| m.graph.same_graph(graph) && !m.graph.is_disposed())
            .map(|m| m.node)
    }

    fn check_membership(&mut self, graph: &GraphContext) -> Result<()> {
        if self.membership.as_ref().is_some_and(|m| m.graph.is_disposed()) {
            debug!("{}: dropping membership of disposed graph", self.descriptor());
            self.membership = None;
        }
        match &self.membership {
            Some(m) if !m.graph.same_graph(graph) => {
                warn!("{} already belongs to another graph", self.descriptor());
                Err(Error::ConnectFailed(Status::INVALID_CONNECTION))
            }
            _ => Ok(()),
        }
    }

    fn connect_input_inner(
        &mut self,
        graph: &GraphContext,
        dest_bus: u32,
        source: &mut AudioUnit,
        source_bus: u32,
    ) -> Result<()> {
        self.check_membership(graph)?;
        source.check_membership(graph)?;

        let dest_node = self.node_in(graph);
        let source_node = source.node_in(graph);
        let dest_description = self.description();
        let source_description = source.description();

        let (dest, src) = graph
            .with_graph(|g| {
                let mut added = Vec::new();
                let outcome = (|| -> NativeResult<(NodeId, NodeId)> {
                    let dest = match dest_node {
                        Some(node) => node,
                        None => {
                            let node = g.add_node(&dest_description)?;
                            added.push(node);
                            node
                        }
                    };
                    let src = match source_node {
                        Some(node) => node,
                        None => {
                            let node = g.add_node(&source_description)?;
                            added.push(node);
                            node
                        }
                    };
                    g.connect(src, source_bus, dest, dest_bus)?;
                    if let Err(status) = g.update() {
                        if let Err(undo) = g.disconnect(dest, dest_bus) {
                            warn!(
                                "failed to remove edge to {} bus {} after rejected update: {}",
                                dest, dest_bus, undo
                            );
                        }
                        return Err(status);
                    }
                    Ok((dest, src))
                })();
                if outcome.is_err() {
                    roll_back(g, &added);
                }
                outcome
            })?
            .map_err(Error::ConnectFailed)?;

        debug!(
            "connected {} bus {} -> {} bus {}",
            src, source_bus, dest, dest_bus
        );
        if dest_node.is_none() {
            self.membership = Some(GraphMembership {
                graph: graph.clone(),
                node: dest,
            });
        }
        if source_node.is_none() {
            source.membership = Some(GraphMembership {
                graph: graph.clone(),
                node: src,
            });
        }
        Ok(())
    }
}

fn roll_back(graph: &mut dyn AudioGraph, added: &[NodeId]) {
    for node in added.iter().rev() {
        if let Err(status) = graph.remove_node(*node) {
            warn!("failed to remove node {} after rejected connection: {}", node, status);
        }
    }
    if !added.is_empty() {
        if let Err(status) = graph.update() {
            warn!("failed to commit node removal after rejected connection: {}", status);
        }
    }
}
