//! Marker lifecycle and render-instruction generation.
//!
//! Each POI id moves through `absent → visible → hidden → absent`. Hidden
//! markers keep their [`MapMarker`] (identified by a creation serial) and
//! only lose their render handle, so re-entering the viewport re-attaches
//! the same marker. The manager never touches the renderer itself: every
//! change is reported as an ordered list of [`RenderInstruction`]s.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cluster::{Cluster, ClusterConfig, compute_clusters};
use super::geometry::Bounds;
use super::poi::{Poi, PoiId};

/// Opaque token identifying one attachment of a marker to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderHandle(u64);

impl RenderHandle {
    /// Raw token value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Engine-side state for one POI's marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    /// Same as the POI id.
    pub id: PoiId,
    /// Latest snapshot of the owning POI.
    pub poi: Poi,
    /// Attached render handle; `None` while hidden.
    pub handle: Option<RenderHandle>,
    /// Category copied from the POI for icon selection.
    pub category: String,
    /// Whether the marker is currently shown.
    pub is_visible: bool,
    /// Creation serial; stable for the marker's whole lifetime.
    pub serial: u64,
}

/// One instruction for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderInstruction {
    /// Draw the marker under its handle.
    Add {
        /// Marker to draw.
        marker: MapMarker,
    },
    /// Erase the drawing attached under `handle`.
    Remove {
        /// Marker whose drawing is removed.
        id: PoiId,
        /// Handle the drawing was attached with.
        handle: RenderHandle,
    },
    /// Drop every cluster icon.
    ClearClusters,
    /// Draw a cluster icon over its members.
    UpdateCluster {
        /// Cluster to draw.
        cluster: Cluster,
    },
}

/// Owner of the marker map.
///
/// Holds at most one [`MapMarker`] per POI id.
#[derive(Debug, Default)]
pub struct MarkerManager {
    markers: BTreeMap<PoiId, MapMarker>,
    next_handle: u64,
    next_serial: u64,
}

impl MarkerManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker for `id`, visible or hidden.
    pub fn get(&self, id: &PoiId) -> Option<&MapMarker> {
        self.markers.get(id)
    }

    /// Number of live markers, visible or hidden.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether no markers exist.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Iterate over the visible markers in id order.
    pub fn visible(&self) -> impl Iterator<Item = &MapMarker> {
        self.markers.values().filter(|marker| marker.is_visible)
    }

    /// Bring the marker map in line with a new snapshot.
    ///
    /// `snapshot` is the full POI set from the source, `filtered` the subset
    /// passing the current filters, and `bounds` the viewport (`None` shows
    /// everything). Markers whose POI left `snapshot` are destroyed. Returns
    /// all removals before all additions.
    pub fn reconcile(
        &mut self,
        snapshot: &[Poi],
        filtered: &[Poi],
        bounds: Option<&Bounds>,
    ) -> Vec<RenderInstruction> {
        let mut removals = Vec::new();
        let mut additions = Vec::new();

        let known: BTreeSet<&PoiId> = snapshot.iter().map(|poi| &poi.id).collect();
        let departed: Vec<PoiId> = self
            .markers
            .keys()
            .filter(|id| !known.contains(id))
            .cloned()
            .collect();
        for id in departed {
            if let Some(marker) = self.markers.remove(&id) {
                removals.extend(detach_instruction(&marker));
            }
        }

        let mut wanted: BTreeSet<&PoiId> = BTreeSet::new();
        for poi in filtered {
            if !wanted.insert(&poi.id) {
                continue;
            }
            let in_view = bounds.is_none_or(|view| view.contains(&poi.coordinate()));
            self.upsert(poi, in_view, &mut removals, &mut additions);
        }

        for marker in self.markers.values_mut() {
            if !wanted.contains(&marker.id) && marker.is_visible {
                removals.extend(detach(marker));
            }
        }

        debug!(
            removed = removals.len(),
            added = additions.len(),
            markers = self.markers.len(),
            "markers reconciled"
        );
        removals.extend(additions);
        removals
    }

    /// Recompute clusters over the visible markers.
    ///
    /// Always starts with [`RenderInstruction::ClearClusters`].
    pub fn cluster_instructions(&self, zoom: u8, config: &ClusterConfig) -> Vec<RenderInstruction> {
        let clusters = compute_clusters(
            self.visible().map(|marker| (&marker.id, marker.poi.coordinate())),
            zoom,
            config,
        );
        std::iter::once(RenderInstruction::ClearClusters)
            .chain(
                clusters
                    .into_iter()
                    .map(|cluster| RenderInstruction::UpdateCluster { cluster }),
            )
            .collect()
    }

    /// Destroy every marker, removing the attached ones from the renderer.
    pub fn clear(&mut self) -> Vec<RenderInstruction> {
        let mut instructions: Vec<RenderInstruction> = self
            .markers
            .values()
            .filter_map(detach_instruction)
            .collect();
        instructions.push(RenderInstruction::ClearClusters);
        self.markers.clear();
        instructions
    }

    fn upsert(
        &mut self,
        poi: &Poi,
        in_view: bool,
        removals: &mut Vec<RenderInstruction>,
        additions: &mut Vec<RenderInstruction>,
    ) {
        let unchanged_in_view = self
            .markers
            .get(&poi.id)
            .is_some_and(|marker| marker.is_visible && marker.poi == *poi);
        let handle = (in_view && !unchanged_in_view).then(|| self.allocate_handle());
        let Some(marker) = self.markers.get_mut(&poi.id) else {
            let marker = MapMarker {
                id: poi.id.clone(),
                poi: poi.clone(),
                handle,
                category: poi.category.clone(),
                is_visible: in_view,
                serial: self.next_serial,
            };
            self.next_serial += 1;
            if in_view {
                additions.push(RenderInstruction::Add {
                    marker: marker.clone(),
                });
            }
            self.markers.insert(poi.id.clone(), marker);
            return;
        };

        let changed = marker.poi != *poi;
        marker.poi = poi.clone();
        marker.category = poi.category.clone();

        match (marker.is_visible, in_view) {
            (true, true) if changed => {
                removals.extend(detach(marker));
                attach(marker, handle, additions);
            }
            (false, true) => attach(marker, handle, additions),
            (true, false) => removals.extend(detach(marker)),
            _ => {}
        }
    }

    fn allocate_handle(&mut self) -> RenderHandle {
        self.next_handle += 1;
        RenderHandle(self.next_handle)
    }
}

fn attach(
    marker: &mut MapMarker,
    handle: Option<RenderHandle>,
    additions: &mut Vec<RenderInstruction>,
) {
    marker.handle = handle;
    marker.is_visible = true;
    additions.push(RenderInstruction::Add {
        marker: marker.clone(),
    });
}

fn detach(marker: &mut MapMarker) -> Option<RenderInstruction> {
    let instruction = detach_instruction(marker);
    marker.handle = None;
    marker.is_visible = false;
    instruction
}

fn detach_instruction(marker: &MapMarker) -> Option<RenderInstruction> {
    marker.handle.map(|handle| RenderInstruction::Remove {
        id: marker.id.clone(),
        handle,
    })
}

#[cfg(test)]
mod tests {
    //! Lifecycle transitions and instruction ordering.

    use super::*;
    use crate::test_support::PoiFixture;
    use rstest::{fixture, rstest};

    const VIEW: Bounds = Bounds {
        north: 3.90,
        south: 3.80,
        east: 11.55,
        west: 11.45,
    };

    #[fixture]
    fn snapshot() -> Vec<Poi> {
        vec![
            PoiFixture::new("a", "Chez Wou", "restaurant").at(3.85, 11.50).build(),
            PoiFixture::new("b", "Gare", "transport").at(3.86, 11.51).build(),
            PoiFixture::new("c", "Kribi Beach", "attraction").at(2.94, 9.91).build(),
        ]
    }

    fn added(instructions: &[RenderInstruction]) -> Vec<&str> {
        instructions
            .iter()
            .filter_map(|instruction| match instruction {
                RenderInstruction::Add { marker } => Some(marker.id.as_str()),
                _ => None,
            })
            .collect()
    }

    fn removed(instructions: &[RenderInstruction]) -> Vec<&str> {
        instructions
            .iter()
            .filter_map(|instruction| match instruction {
                RenderInstruction::Remove { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    #[rstest]
    fn first_reconcile_adds_only_markers_in_view(snapshot: Vec<Poi>) {
        let mut manager = MarkerManager::new();
        let instructions = manager.reconcile(&snapshot, &snapshot, Some(&VIEW));

        assert_eq!(added(&instructions), ["a", "b"]);
        assert_eq!(manager.len(), 3);
        let hidden = manager.get(&PoiId::from("c")).expect("marker exists");
        assert!(!hidden.is_visible);
        assert!(hidden.handle.is_none());
    }

    #[rstest]
    fn leaving_the_viewport_hides_without_destroying(snapshot: Vec<Poi>) {
        let mut manager = MarkerManager::new();
        manager.reconcile(&snapshot, &snapshot, Some(&VIEW));
        let serial = manager.get(&PoiId::from("a")).map(|marker| marker.serial);

        let elsewhere = Bounds {
            north: 3.0,
            south: 2.9,
            east: 10.0,
            west: 9.8,
        };
        let moved = manager.reconcile(&snapshot, &snapshot, Some(&elsewhere));
        assert_eq!(removed(&moved), ["a", "b"]);
        assert_eq!(added(&moved), ["c"]);

        let back = manager.reconcile(&snapshot, &snapshot, Some(&VIEW));
        let marker = manager.get(&PoiId::from("a")).expect("marker survives");
        assert!(marker.is_visible);
        assert_eq!(Some(marker.serial), serial);
        assert_eq!(added(&back), ["a", "b"]);
    }

    #[rstest]
    fn leaving_the_source_destroys_the_marker(snapshot: Vec<Poi>) {
        let mut manager = MarkerManager::new();
        manager.reconcile(&snapshot, &snapshot, Some(&VIEW));

        let remaining = &snapshot[1..];
        let instructions = manager.reconcile(remaining, remaining, Some(&VIEW));

        assert_eq!(removed(&instructions), ["a"]);
        assert!(manager.get(&PoiId::from("a")).is_none());
        assert_eq!(manager.len(), 2);
    }

    #[rstest]
    fn filtered_out_markers_are_hidden_and_revived(snapshot: Vec<Poi>) {
        let mut manager = MarkerManager::new();
        manager.reconcile(&snapshot, &snapshot, Some(&VIEW));

        let only_b = vec![snapshot[1].clone()];
        let instructions = manager.reconcile(&snapshot, &only_b, Some(&VIEW));
        assert_eq!(removed(&instructions), ["a"]);
        assert!(manager.get(&PoiId::from("a")).is_some());

        let revived = manager.reconcile(&snapshot, &snapshot, Some(&VIEW));
        assert_eq!(added(&revived), ["a"]);
    }

    #[rstest]
    fn duplicate_ids_never_produce_two_markers(snapshot: Vec<Poi>) {
        let mut manager = MarkerManager::new();
        let mut doubled = snapshot.clone();
        doubled.extend(snapshot.iter().cloned());

        for _ in 0..3 {
            manager.reconcile(&doubled, &doubled, None);
        }

        assert_eq!(manager.len(), 3);
        assert_eq!(manager.visible().count(), 3);
    }

    #[rstest]
    fn removals_precede_additions(snapshot: Vec<Poi>) {
        let mut manager = MarkerManager::new();
        manager.reconcile(&snapshot, &snapshot[..1], None);
        let instructions = manager.reconcile(&snapshot, &snapshot[1..], None);

        let first_add = instructions
            .iter()
            .position(|instruction| matches!(instruction, RenderInstruction::Add { .. }));
        let last_remove = instructions
            .iter()
            .rposition(|instruction| matches!(instruction, RenderInstruction::Remove { .. }));
        assert!(last_remove < first_add);
    }

    #[rstest]
    fn clear_removes_attached_markers(snapshot: Vec<Poi>) {
        let mut manager = MarkerManager::new();
        manager.reconcile(&snapshot, &snapshot, Some(&VIEW));

        let instructions = manager.clear();

        assert_eq!(removed(&instructions), ["a", "b"]);
        assert_eq!(instructions.last(), Some(&RenderInstruction::ClearClusters));
        assert!(manager.is_empty());
    }

    #[rstest]
    fn cluster_instructions_start_with_clear(snapshot: Vec<Poi>) {
        let mut manager = MarkerManager::new();
        manager.reconcile(&snapshot, &snapshot, Some(&VIEW));

        let instructions = manager.cluster_instructions(12, &ClusterConfig::default());

        assert_eq!(instructions.first(), Some(&RenderInstruction::ClearClusters));
        assert!(matches!(
            instructions.get(1),
            Some(RenderInstruction::UpdateCluster { cluster }) if cluster.count == 2
        ));
    }
}
