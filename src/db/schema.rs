

pub const EQUIPMENTS: &str = "equipments";
pub const DOCUMENTS: &str = "documents";
pub const PARTS: &str = "parts";
pub const GROUPS: &str = "groups";
pub const INTERVENTIONS: &str = "interventions";


pub const EQUIPMENT_GROUP_MEMBERS: &str = "equipment_group_members";
pub const DOCUMENT_GROUP_MEMBERS: &str = "document_group_members";
pub const PART_GROUP_MEMBERS: &str = "part_group_members";


pub const EQUIPMENT_DOCUMENTS: &str = "equipment_documents";
pub const EQUIPMENT_PARTS: &str = "equipment_parts";


pub const ID: &str = "id";
pub const NAME: &str = "name";
pub const IMAGE_URL: &str = "image_url";
pub const GROUP_ID: &str = "group_id";
pub const EQUIPMENT_ID: &str = "equipment_id";
pub const DOCUMENT_ID: &str = "document_id";
pub const PART_ID: &str = "part_id";
