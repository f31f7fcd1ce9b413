// =============================================================================
// INSTANCE — Un graphe d'objets conforme à un Catalog
// =============================================================================
//
// Une instance peuple les entités d'un catalogue :
//   - chaque OBJET appartient à exactement une entité (sa classe directe)
//     et reçoit un RowId local à cette entité
//   - il porte des valeurs d'ATTRIBUTS, dont la clé `$id`
//   - il porte des LIENS : rôle → objets référencés
//
// EXEMPLE :
//
//   Order                                   Customer
//   ┌──────────┬───────┬──────────┐         ┌─────────┬───────┐
//   │ $id      │ total │ customer │         │ $id     │ name  │
//   ├──────────┼───────┼──────────┤         ├─────────┼───────┤
//   │ "o1"     │ 12.5  │ → c1     │ ──────▶ │ "c1"    │ "Ada" │
//   │ "o2"     │ 3.0   │ (aucun)  │         └─────────┴───────┘
//   └──────────┴───────┴──────────┘
//
// EXTENSION : l'extension d'une entité regroupe ses objets directs et ceux
// de toutes ses sous-classes. C'est ce que parcourt l'interpréteur.
//
// CLÉ : un objet inséré sans `$id` reçoit "{Entité}#{RowId}".
//
// =============================================================================

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::catalog::{Catalog, EntityId, Side, KEY_ATTRIBUTE};
use super::typeside::Value;

/// Identifiant d'un objet dans son entité directe
pub type RowId = u64;

/// Référence vers un objet : côté, entité directe, ligne.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    pub side: Side,
    pub entity: EntityId,
    pub row: RowId,
}

/// Les objets directs d'une entité
#[derive(Debug, Clone, Default)]
pub struct EntityData {
    next_id: RowId,
    /// RowId → (nom d'attribut → valeur)
    pub attribute_values: BTreeMap<RowId, HashMap<String, Value>>,
    /// RowId → (rôle → objets liés, dans l'ordre d'ajout)
    pub links: BTreeMap<RowId, HashMap<String, Vec<ObjRef>>>,
}

impl EntityData {
    fn allocate(&mut self) -> RowId {
        self.next_id += 1;
        let id = self.next_id;
        self.attribute_values.insert(id, HashMap::new());
        self.links.insert(id, HashMap::new());
        id
    }

    pub fn len(&self) -> usize {
        self.attribute_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attribute_values.is_empty()
    }

    /// Les RowId dans l'ordre de création
    pub fn row_ids(&self) -> Vec<RowId> {
        self.attribute_values.keys().copied().collect()
    }

    pub fn get_attr(&self, row: RowId, attr: &str) -> Option<&Value> {
        self.attribute_values.get(&row)?.get(attr)
    }

    pub fn get_links(&self, row: RowId, role: &str) -> &[ObjRef] {
        self.links
            .get(&row)
            .and_then(|roles| roles.get(role))
            .map_or(&[], |v| v.as_slice())
    }
}

/// Une instance complète : une EntityData par entité du catalogue.
#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    pub catalog_name: String,
    pub side: Side,
    /// Indexé par EntityId
    data: Vec<EntityData>,
    names: Vec<String>,
}

impl Instance {
    /// Instance vide pour un catalogue
    pub fn new(name: &str, catalog: &Catalog) -> Self {
        Instance {
            name: name.to_string(),
            catalog_name: catalog.name.clone(),
            side: catalog.side,
            data: vec![EntityData::default(); catalog.len()],
            names: catalog.entities().map(|(_, e)| e.name.clone()).collect(),
        }
    }

    /// Crée un objet vide dans `entity`, avec sa clé par défaut.
    pub fn create(&mut self, entity: EntityId) -> ObjRef {
        let row = self.data[entity.0].allocate();
        let key = Value::String(format!("{}#{}", self.names[entity.0], row));
        self.data[entity.0]
            .attribute_values
            .entry(row)
            .or_default()
            .insert(KEY_ATTRIBUTE.to_string(), key);
        ObjRef { side: self.side, entity, row }
    }

    /// Insère un objet par nom d'entité avec ses attributs.
    ///
    /// Panique si l'entité n'existe pas (erreur de construction).
    pub fn insert(&mut self, catalog: &Catalog, entity: &str, attrs: &[(&str, Value)]) -> ObjRef {
        let id = catalog
            .entity_id(entity)
            .unwrap_or_else(|| panic!("entité '{}' inconnue de {}", entity, catalog.name));
        let obj = self.create(id);
        for (name, value) in attrs {
            self.set_attr(obj, name, value.clone());
        }
        obj
    }

    pub fn set_attr(&mut self, obj: ObjRef, attr: &str, value: Value) {
        self.data[obj.entity.0]
            .attribute_values
            .entry(obj.row)
            .or_default()
            .insert(attr.to_string(), value);
    }

    pub fn get_attr(&self, obj: ObjRef, attr: &str) -> Option<&Value> {
        self.data.get(obj.entity.0)?.get_attr(obj.row, attr)
    }

    /// Ajoute un lien `from --role--> to`
    pub fn link(&mut self, from: ObjRef, role: &str, to: ObjRef) {
        let links = self.data[from.entity.0].links.entry(from.row).or_default();
        let targets = links.entry(role.to_string()).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    /// Remplace tous les liens d'un rôle
    pub fn set_links(&mut self, from: ObjRef, role: &str, to: Vec<ObjRef>) {
        let links = self.data[from.entity.0].links.entry(from.row).or_default();
        if to.is_empty() {
            links.remove(role);
        } else {
            links.insert(role.to_string(), to);
        }
    }

    pub fn get_links(&self, obj: ObjRef, role: &str) -> &[ObjRef] {
        self.data.get(obj.entity.0).map_or(&[], |d| d.get_links(obj.row, role))
    }

    /// La clé `$id` d'un objet
    pub fn key_of(&self, obj: ObjRef) -> Option<&Value> {
        self.get_attr(obj, KEY_ATTRIBUTE)
    }

    pub fn entity_data(&self, entity: EntityId) -> &EntityData {
        &self.data[entity.0]
    }

    pub fn entity_name(&self, entity: EntityId) -> &str {
        &self.names[entity.0]
    }

    /// Objets de l'entité et de ses sous-classes, par entité puis par RowId.
    pub fn extent(&self, catalog: &Catalog, entity: EntityId) -> Vec<ObjRef> {
        catalog
            .descendants_or_self(entity)
            .into_iter()
            .flat_map(|e| {
                self.data[e.0]
                    .row_ids()
                    .into_iter()
                    .map(move |row| ObjRef { side: self.side, entity: e, row })
            })
            .collect()
    }

    /// Premier objet de l'extension dont la clé vaut `key`
    pub fn find_by_key(&self, catalog: &Catalog, entity: EntityId, key: &Value) -> Option<ObjRef> {
        self.extent(catalog, entity)
            .into_iter()
            .find(|&obj| self.key_of(obj) == Some(key))
    }

    /// Nombre d'objets directs d'une entité
    pub fn count(&self, entity: EntityId) -> usize {
        self.data[entity.0].len()
    }

    /// Nombre total d'objets
    pub fn total_objects(&self) -> usize {
        self.data.iter().map(|d| d.len()).sum()
    }

    /// Nom lisible d'un objet : `Entité[clé]`
    pub fn label(&self, obj: ObjRef) -> String {
        match self.key_of(obj) {
            Some(key) => format!("{}[{}]", self.entity_name(obj.entity), key),
            None => format!("{}#{}", self.entity_name(obj.entity), obj.row),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "instance {} : {} = {{", self.name, self.catalog_name)?;
        for (i, entity_data) in self.data.iter().enumerate() {
            if entity_data.is_empty() {
                continue;
            }
            writeln!(f, "  {} ({} objets):", self.names[i], entity_data.len())?;
            for row in entity_data.row_ids() {
                write!(f, "    [{}]", row)?;
                if let Some(attrs) = entity_data.attribute_values.get(&row) {
                    let mut attrs: Vec<_> = attrs.iter().collect();
                    attrs.sort_by(|a, b| a.0.cmp(b.0));
                    for (name, value) in attrs {
                        write!(f, " {}: {},", name, value)?;
                    }
                }
                if let Some(links) = entity_data.links.get(&row) {
                    let mut roles: Vec<_> = links.iter().collect();
                    roles.sort_by(|a, b| a.0.cmp(b.0));
                    for (role, targets) in roles {
                        let labels: Vec<String> = targets.iter().map(|&t| self.label(t)).collect();
                        write!(f, " {} -> {},", role, labels.join(" "))?;
                    }
                }
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }
}
