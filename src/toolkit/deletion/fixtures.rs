use std::sync::Arc;

use serde_json::json;

use crate::db::InMemoryStore;


/// Three machines, three groups.
///
/// - `E1` sits in `G1` (with `E2`) and alone in `G2`; it has `D1`/`P1`
///   linked directly and two interventions.
/// - `G1` shares `D2`, `D3`; `G2` shares `P2`, `P3`, `P4`; `P4` is also
///   linked straight to `E3`, which alone fills `G3`.
pub async fn plant() -> Arc<InMemoryStore> {
    let store = InMemoryStore::from_snapshot(json!({
        "equipments": [
            {"id": "E1", "name": "Compresseur A", "status": "active", "image_url": "https://cdn.example/e1.png"},
            {"id": "E2", "name": "Pompe B", "status": "active", "image_url": null},
            {"id": "E3", "name": "Tour C", "status": "maintenance"},
        ],
        "documents": [
            {"id": "D1", "name": "Manuel compresseur"},
            {"id": "D2", "name": "Plan atelier"},
            {"id": "D3", "name": "Consignes sécurité"},
        ],
        "parts": [
            {"id": "P1", "name": "Filtre à air"},
            {"id": "P2", "name": "Courroie"},
            {"id": "P3", "name": "Joint"},
            {"id": "P4", "name": "Roulement"},
        ],
        "groups": [
            {"id": "G1", "name": "Atelier Nord"},
            {"id": "G2", "name": "Ligne 2"},
            {"id": "G3", "name": "Réserve"},
        ],
        "interventions": [
            {"id": "I1", "equipment_id": "E1"},
            {"id": "I2", "equipment_id": "E1"},
            {"id": "I3", "equipment_id": "E2"},
        ],
        "equipment_group_members": [
            {"equipment_id": "E1", "group_id": "G1"},
            {"equipment_id": "E2", "group_id": "G1"},
            {"equipment_id": "E1", "group_id": "G2"},
            {"equipment_id": "E3", "group_id": "G3"},
        ],
        "document_group_members": [
            {"document_id": "D2", "group_id": "G1"},
            {"document_id": "D3", "group_id": "G1"},
        ],
        "part_group_members": [
            {"part_id": "P2", "group_id": "G2"},
            {"part_id": "P3", "group_id": "G2"},
            {"part_id": "P4", "group_id": "G2"},
        ],
        "equipment_documents": [
            {"equipment_id": "E1", "document_id": "D1"},
        ],
        "equipment_parts": [
            {"equipment_id": "E1", "part_id": "P1"},
            {"equipment_id": "E3", "part_id": "P4"},
        ],
    }))
    .expect("fixture snapshot is a valid table map");

    Arc::new(store)
}
