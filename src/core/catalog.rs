// =============================================================================
// CATALOG — Vue en lecture d'un métamodèle (entités, attributs, associations)
// =============================================================================
//
// Un Catalog décrit UN côté d'une correspondance : le métamodèle source ou
// le métamodèle cible. C'est un diagramme de classes :
//   - des ENTITÉS (classes), éventuellement abstraites ou interfaces,
//     reliées par héritage (simple ou multiple)
//   - des ATTRIBUTS typés, portés par une entité
//   - des ASSOCIATIONS orientées : propriétaire --rôle--> entité cible,
//     avec une cardinalité à chaque extrémité
//
// EXEMPLE :
//
//   Order ──customer (One)──▶ Customer
//     │                          │
//     │id, total                 │id, name
//     ▼                          ▼
//   String, Real              String, String
//
// INDEXATION : chaque élément reçoit un indice stable (EntityId,
// AttributeId, AssociationId) à sa création. Toutes les tables de la
// synthèse sont indexées par ces entiers, jamais par identité d'objet.
//
// Le catalogue n'est jamais modifié par la synthèse : l'orchestrateur du
// mode raffinement travaille sur ses propres copies.
//
// =============================================================================

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::typeside::Type;
use crate::error::CatalogError;

/// Nom de l'attribut clé qui identifie une instance.
///
/// Il est implicite sur toute entité ; le mode raffinement le déclare
/// explicitement sur les entités racines.
pub const KEY_ATTRIBUTE: &str = "$id";

/// Côté d'une correspondance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// Indice stable d'une entité dans son catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

/// Indice stable d'un attribut dans son catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(pub usize);

/// Indice stable d'une association dans son catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssociationId(pub usize);

/// Référence complète vers une entité : côté, indice et nom.
///
/// Les nœuds d'expression et les types la transportent pour rester
/// lisibles sans avoir le catalogue sous la main.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub side: Side,
    pub id: EntityId,
    pub name: String,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Cardinalité d'une extrémité d'association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    ZeroOne,
    Many,
}

impl Cardinality {
    /// La navigation vers cette extrémité produit-elle une collection ?
    pub fn is_many(&self) -> bool {
        matches!(self, Cardinality::Many)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::One => write!(f, "1"),
            Cardinality::ZeroOne => write!(f, "0..1"),
            Cardinality::Many => write!(f, "*"),
        }
    }
}

/// Une entité (classe) du métamodèle
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub is_abstract: bool,
    pub is_interface: bool,
    /// Attributs déclarés, dans l'ordre de déclaration
    pub attributes: Vec<AttributeId>,
    /// Associations sortantes déclarées, dans l'ordre de déclaration
    pub associations: Vec<AssociationId>,
    /// Super-classes directes
    pub superclasses: Vec<EntityId>,
}

/// Un attribut typé
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub ty: Type,
    /// Entité propriétaire (référence arrière, pas possession)
    pub owner: EntityId,
}

/// Une association orientée : `owner --role2--> target`.
///
/// `role1` nomme le propriétaire vu depuis la cible (peut être vide).
/// `card1` est la cardinalité côté propriétaire, `card2` côté cible.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub owner: EntityId,
    pub target: EntityId,
    pub role1: String,
    pub role2: String,
    pub card1: Cardinality,
    pub card2: Cardinality,
}

/// Le catalogue complet d'un côté de la correspondance.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub name: String,
    pub side: Side,
    entities: Vec<Entity>,
    attributes: Vec<Attribute>,
    associations: Vec<Association>,
    /// nom → indice, dans l'ordre de déclaration
    index: IndexMap<String, EntityId>,
}

impl Catalog {
    /// Crée un catalogue vide
    pub fn new(name: &str, side: Side) -> Self {
        Catalog {
            name: name.to_string(),
            side,
            entities: Vec::new(),
            attributes: Vec::new(),
            associations: Vec::new(),
            index: IndexMap::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------
    //
    // Les méthodes `add_*` s'enchaînent et paniquent sur une incohérence
    // (nom inconnu ou dupliqué) : ce sont des erreurs de programmation.
    // Les entrées externes passent par `from_spec`, qui renvoie une erreur.

    /// Ajoute une entité concrète
    pub fn add_entity(&mut self, name: &str) -> &mut Self {
        if let Err(err) = self.insert_entity(name, false, false) {
            panic!("{}", err);
        }
        self
    }

    /// Ajoute une entité abstraite
    pub fn add_abstract_entity(&mut self, name: &str) -> &mut Self {
        if let Err(err) = self.insert_entity(name, true, false) {
            panic!("{}", err);
        }
        self
    }

    /// Ajoute une interface (abstraite par nature)
    pub fn add_interface(&mut self, name: &str) -> &mut Self {
        if let Err(err) = self.insert_entity(name, true, true) {
            panic!("{}", err);
        }
        self
    }

    /// Déclare `superclass` comme super-classe directe de `entity`
    pub fn add_superclass(&mut self, entity: &str, superclass: &str) -> &mut Self {
        if let Err(err) = self.insert_superclass(entity, superclass) {
            panic!("{}", err);
        }
        self
    }

    /// Ajoute un attribut typé à une entité
    pub fn add_attribute(&mut self, entity: &str, name: &str, ty: Type) -> &mut Self {
        if let Err(err) = self.insert_attribute(entity, name, ty) {
            panic!("{}", err);
        }
        self
    }

    /// Ajoute une association `owner --role--> target` sans rôle inverse
    pub fn add_association(
        &mut self,
        owner: &str,
        role: &str,
        target: &str,
        card1: Cardinality,
        card2: Cardinality,
    ) -> &mut Self {
        if let Err(err) = self.insert_association(owner, "", role, target, card1, card2) {
            panic!("{}", err);
        }
        self
    }

    /// Ajoute une association avec son rôle inverse `role1`
    pub fn add_association_with_inverse(
        &mut self,
        owner: &str,
        role1: &str,
        role2: &str,
        target: &str,
        card1: Cardinality,
        card2: Cardinality,
    ) -> &mut Self {
        if let Err(err) = self.insert_association(owner, role1, role2, target, card1, card2) {
            panic!("{}", err);
        }
        self
    }

    pub fn insert_entity(
        &mut self,
        name: &str,
        is_abstract: bool,
        is_interface: bool,
    ) -> Result<EntityId, CatalogError> {
        if self.index.contains_key(name) {
            return Err(CatalogError::DuplicateEntity {
                catalog: self.name.clone(),
                entity: name.to_string(),
            });
        }
        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            name: name.to_string(),
            is_abstract,
            is_interface,
            attributes: Vec::new(),
            associations: Vec::new(),
            superclasses: Vec::new(),
        });
        self.index.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn insert_superclass(&mut self, entity: &str, superclass: &str) -> Result<(), CatalogError> {
        let sub = self.require(entity)?;
        let sup = self.require(superclass)?;
        if sub == sup {
            return Err(CatalogError::SelfInheritance(entity.to_string()));
        }
        let supers = &mut self.entities[sub.0].superclasses;
        if !supers.contains(&sup) {
            supers.push(sup);
        }
        Ok(())
    }

    pub fn insert_attribute(&mut self, entity: &str, name: &str, ty: Type) -> Result<AttributeId, CatalogError> {
        let owner = self.require(entity)?;
        let clash = self.entities[owner.0]
            .attributes
            .iter()
            .any(|a| self.attributes[a.0].name == name);
        if clash {
            return Err(CatalogError::DuplicateAttribute {
                entity: entity.to_string(),
                attribute: name.to_string(),
            });
        }
        let id = AttributeId(self.attributes.len());
        self.attributes.push(Attribute { name: name.to_string(), ty, owner });
        self.entities[owner.0].attributes.push(id);
        Ok(id)
    }

    pub fn insert_association(
        &mut self,
        owner: &str,
        role1: &str,
        role2: &str,
        target: &str,
        card1: Cardinality,
        card2: Cardinality,
    ) -> Result<AssociationId, CatalogError> {
        let owner_id = self.require(owner)?;
        let target_id = self.require(target)?;
        let clash = self.entities[owner_id.0]
            .associations
            .iter()
            .any(|a| self.associations[a.0].role2 == role2);
        if clash {
            return Err(CatalogError::DuplicateRole {
                entity: owner.to_string(),
                role: role2.to_string(),
            });
        }
        let id = AssociationId(self.associations.len());
        self.associations.push(Association {
            owner: owner_id,
            target: target_id,
            role1: role1.to_string(),
            role2: role2.to_string(),
            card1,
            card2,
        });
        self.entities[owner_id.0].associations.push(id);
        Ok(id)
    }

    fn require(&self, name: &str) -> Result<EntityId, CatalogError> {
        self.entity_id(name).ok_or_else(|| CatalogError::UnknownEntity {
            catalog: self.name.clone(),
            entity: name.to_string(),
        })
    }

    // -------------------------------------------------------------------------
    // Lecture
    // -------------------------------------------------------------------------

    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.index.get(name).copied()
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn attribute(&self, id: AttributeId) -> &Attribute {
        &self.attributes[id.0]
    }

    pub fn association(&self, id: AssociationId) -> &Association {
        &self.associations[id.0]
    }

    /// Indices de toutes les entités, dans l'ordre de déclaration
    pub fn entity_ids(&self) -> Vec<EntityId> {
        (0..self.entities.len()).map(EntityId).collect()
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId(i), e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Référence nommée vers une entité de ce catalogue
    pub fn entity_ref(&self, id: EntityId) -> EntityRef {
        EntityRef {
            side: self.side,
            id,
            name: self.entities[id.0].name.clone(),
        }
    }

    /// Ancêtres transitifs d'une entité (sans elle-même), en largeur d'abord.
    pub fn ancestors(&self, id: EntityId) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue: Vec<EntityId> = self.entities[id.0].superclasses.clone();
        let mut cursor = 0;
        while cursor < queue.len() {
            let current = queue[cursor];
            cursor += 1;
            if current == id || !seen.insert(current) {
                continue;
            }
            order.push(current);
            queue.extend(self.entities[current.0].superclasses.iter().copied());
        }
        order
    }

    /// `sub` est-il `sup` ou un de ses descendants ?
    pub fn conforms_to(&self, sub: EntityId, sup: EntityId) -> bool {
        sub == sup || self.ancestors(sub).contains(&sup)
    }

    /// L'entité et tous ses descendants : l'extension d'une classe.
    pub fn descendants_or_self(&self, id: EntityId) -> Vec<EntityId> {
        self.entity_ids()
            .into_iter()
            .filter(|&e| self.conforms_to(e, id))
            .collect()
    }

    /// Profondeur d'héritage (0 pour une racine)
    pub fn depth(&self, id: EntityId) -> usize {
        self.depth_guarded(id, &mut HashSet::new())
    }

    fn depth_guarded(&self, id: EntityId, visiting: &mut HashSet<EntityId>) -> usize {
        if !visiting.insert(id) {
            return 0; // cycle : signalé par validate_catalog
        }
        let depth = self.entities[id.0]
            .superclasses
            .iter()
            .map(|&s| 1 + self.depth_guarded(s, visiting))
            .max()
            .unwrap_or(0);
        visiting.remove(&id);
        depth
    }

    /// Entités sans super-classe
    pub fn roots(&self) -> Vec<EntityId> {
        self.entities()
            .filter(|(_, e)| e.superclasses.is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    /// Tous les attributs disponibles sur une entité : hérités d'abord
    /// (dans l'ordre des super-classes), puis propres.
    pub fn all_attributes(&self, id: EntityId) -> Vec<AttributeId> {
        let mut out = Vec::new();
        self.collect_lineage(id, &mut HashSet::new(), &mut |e| {
            out.extend(e.attributes.iter().copied());
        });
        out
    }

    /// Toutes les associations disponibles sur une entité, héritées d'abord.
    pub fn all_associations(&self, id: EntityId) -> Vec<AssociationId> {
        let mut out = Vec::new();
        self.collect_lineage(id, &mut HashSet::new(), &mut |e| {
            out.extend(e.associations.iter().copied());
        });
        out
    }

    fn collect_lineage(&self, id: EntityId, seen: &mut HashSet<EntityId>, visit: &mut dyn FnMut(&Entity)) {
        if !seen.insert(id) {
            return;
        }
        let entity = &self.entities[id.0];
        for &sup in &entity.superclasses {
            self.collect_lineage(sup, seen, visit);
        }
        visit(entity);
    }

    /// Cherche un attribut (propre ou hérité) par son nom
    pub fn find_attribute(&self, entity: EntityId, name: &str) -> Option<AttributeId> {
        self.all_attributes(entity)
            .into_iter()
            .find(|a| self.attributes[a.0].name == name)
    }

    /// Cherche une association sortante (propre ou héritée) par son rôle
    pub fn find_role(&self, entity: EntityId, role: &str) -> Option<AssociationId> {
        self.all_associations(entity)
            .into_iter()
            .find(|a| self.associations[a.0].role2 == role)
    }

    /// Type produit par la navigation d'une association depuis son propriétaire
    pub fn role_type(&self, assoc: AssociationId) -> Type {
        let a = &self.associations[assoc.0];
        let target = Type::Entity(self.entity_ref(a.target));
        if a.card2.is_many() {
            Type::Set(Box::new(target))
        } else {
            target
        }
    }

    /// Interprète un nom de type : type de base, `Set(..)`, `Sequence(..)`,
    /// entité de ce catalogue, sinon énumération.
    pub fn resolve_type_name(&self, text: &str) -> Type {
        let text = text.trim();
        for (prefix, wrap) in [("Set(", true), ("Sequence(", false)] {
            if let Some(inner) = text.strip_prefix(prefix).and_then(|r| r.strip_suffix(')')) {
                let elem = Box::new(self.resolve_type_name(inner));
                return if wrap { Type::Set(elem) } else { Type::Sequence(elem) };
            }
        }
        if let Some(primitive) = Type::primitive(text) {
            return primitive;
        }
        match self.entity_id(text) {
            Some(id) => Type::Entity(self.entity_ref(id)),
            None => Type::Enumeration(text.to_string()),
        }
    }

    // -------------------------------------------------------------------------
    // Copie et échange
    // -------------------------------------------------------------------------

    /// Duplique la structure complète sous un autre nom et un autre côté,
    /// chaque entité renommée `prefix + nom`.
    ///
    /// Les indices sont conservés : l'entité `i` de la copie correspond à
    /// l'entité `i` de l'original.
    pub fn renamed_copy(&self, name: &str, side: Side, prefix: &str) -> Catalog {
        let mut copy = Catalog::new(name, side);
        copy.entities = self
            .entities
            .iter()
            .map(|e| Entity { name: format!("{}{}", prefix, e.name), ..e.clone() })
            .collect();
        copy.index = copy
            .entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), EntityId(i)))
            .collect();
        copy.associations = self.associations.clone();
        copy.attributes = self
            .attributes
            .iter()
            .map(|a| Attribute { ty: copy.retarget_type(&a.ty), ..a.clone() })
            .collect();
        copy
    }

    /// Réécrit les références d'entités d'un type vers ce catalogue
    /// (même indice, nouveau côté et nouveau nom).
    fn retarget_type(&self, ty: &Type) -> Type {
        match ty {
            Type::Entity(r) if r.id.0 < self.entities.len() => Type::Entity(self.entity_ref(r.id)),
            Type::Set(elem) => Type::Set(Box::new(self.retarget_type(elem))),
            Type::Sequence(elem) => Type::Sequence(Box::new(self.retarget_type(elem))),
            other => other.clone(),
        }
    }

    /// Construit un catalogue à partir de sa description sérialisable.
    pub fn from_spec(spec: &CatalogSpec, side: Side) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog::new(&spec.name, side);

        // Passe 1 : les entités (les références peuvent être en avant)
        for e in &spec.entities {
            catalog.insert_entity(&e.name, e.is_abstract || e.is_interface, e.is_interface)?;
        }

        // Passe 2 : héritage, attributs, associations
        for e in &spec.entities {
            for sup in &e.superclasses {
                catalog.insert_superclass(&e.name, sup)?;
            }
            for a in &e.attributes {
                let ty = catalog.resolve_type_name(&a.ty);
                catalog.insert_attribute(&e.name, &a.name, ty)?;
            }
            for a in &e.associations {
                catalog.insert_association(&e.name, &a.inverse_role, &a.role, &a.target, a.card1, a.card2)?;
            }
        }

        Ok(catalog)
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "metamodel {} ({}) = {{", self.name, self.side)?;
        for (_, entity) in self.entities() {
            let kind = if entity.is_interface {
                "interface "
            } else if entity.is_abstract {
                "abstract "
            } else {
                ""
            };
            write!(f, "  {}{}", kind, entity.name)?;
            if !entity.superclasses.is_empty() {
                let supers: Vec<&str> = entity
                    .superclasses
                    .iter()
                    .map(|s| self.entities[s.0].name.as_str())
                    .collect();
                write!(f, " extends {}", supers.join(", "))?;
            }
            writeln!(f)?;
            for a in &entity.attributes {
                let attr = &self.attributes[a.0];
                writeln!(f, "    {} : {}", attr.name, attr.ty)?;
            }
            for a in &entity.associations {
                let assoc = &self.associations[a.0];
                writeln!(
                    f,
                    "    {} : {} [{} -> {}]",
                    assoc.role2, self.entities[assoc.target.0].name, assoc.card1, assoc.card2
                )?;
            }
        }
        write!(f, "}}")
    }
}

// =============================================================================
// Description sérialisable (entrée des outils en ligne de commande)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSpec {
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "interface")]
    pub is_interface: bool,
    #[serde(default)]
    pub superclasses: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub associations: Vec<AssociationSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationSpec {
    pub role: String,
    pub target: String,
    #[serde(default)]
    pub inverse_role: String,
    #[serde(default = "default_card1")]
    pub card1: Cardinality,
    #[serde(default = "default_card2")]
    pub card2: Cardinality,
}

fn default_card1() -> Cardinality {
    Cardinality::Many
}

fn default_card2() -> Cardinality {
    Cardinality::One
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Le métamodèle Order/Customer classique
    fn shop() -> Catalog {
        let mut c = Catalog::new("Shop", Side::Source);
        c.add_entity("Order")
         .add_entity("Customer")
         .add_attribute("Order", "id", Type::String)
         .add_attribute("Order", "total", Type::Real)
         .add_attribute("Customer", "id", Type::String)
         .add_attribute("Customer", "name", Type::String)
         .add_association("Order", "customer", "Customer", Cardinality::Many, Cardinality::One);
        c
    }

    #[test]
    fn test_indices_follow_declaration_order() {
        let c = shop();
        assert_eq!(c.entity_id("Order"), Some(EntityId(0)));
        assert_eq!(c.entity_id("Customer"), Some(EntityId(1)));
        assert_eq!(c.entity(EntityId(0)).attributes.len(), 2);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_inherited_features_come_first() {
        let mut c = Catalog::new("Shapes", Side::Source);
        c.add_abstract_entity("Shape")
         .add_entity("Circle")
         .add_superclass("Circle", "Shape")
         .add_attribute("Shape", "name", Type::String)
         .add_attribute("Circle", "radius", Type::Real);

        let circle = c.entity_id("Circle").unwrap();
        let names: Vec<&str> = c
            .all_attributes(circle)
            .into_iter()
            .map(|a| c.attribute(a).name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "radius"]);
        assert_eq!(c.depth(circle), 1);
        assert!(c.find_attribute(circle, "name").is_some());
    }

    #[test]
    fn test_ancestors_and_extent() {
        let mut c = Catalog::new("H", Side::Source);
        c.add_entity("A").add_entity("B").add_entity("C")
         .add_superclass("B", "A")
         .add_superclass("C", "B");
        let a = c.entity_id("A").unwrap();
        let cc = c.entity_id("C").unwrap();
        assert_eq!(c.ancestors(cc).len(), 2);
        assert!(c.conforms_to(cc, a));
        assert_eq!(c.descendants_or_self(a).len(), 3);
        assert_eq!(c.roots(), vec![a]);
    }

    #[test]
    fn test_role_type_follows_cardinality() {
        let c = shop();
        let order = c.entity_id("Order").unwrap();
        let assoc = c.find_role(order, "customer").unwrap();
        assert!(matches!(c.role_type(assoc), Type::Entity(_)));
    }

    #[test]
    fn test_renamed_copy_keeps_indices() {
        let c = shop();
        let out = c.renamed_copy("OUT", Side::Target, "OUT$");
        assert_eq!(out.entity_id("OUT$Order"), Some(EntityId(0)));
        assert_eq!(out.entity_ref(EntityId(1)).name, "OUT$Customer");
        assert_eq!(out.side, Side::Target);
        assert!(out.entity_id("Order").is_none());
    }

    #[test]
    fn test_resolve_type_name() {
        let c = shop();
        assert_eq!(c.resolve_type_name("Integer"), Type::Integer);
        assert_eq!(c.resolve_type_name("Set(String)"), Type::Set(Box::new(Type::String)));
        assert!(matches!(c.resolve_type_name("Customer"), Type::Entity(_)));
        assert_eq!(c.resolve_type_name("Colour"), Type::Enumeration("Colour".into()));
    }

    #[test]
    fn test_from_spec_reports_unknown_entity() {
        let spec: CatalogSpec = serde_json::from_str(
            r#"{ "name": "Bad", "entities": [
                 { "name": "A", "superclasses": ["Missing"] } ] }"#,
        ).unwrap();
        let err = Catalog::from_spec(&spec, Side::Source).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownEntity { .. }));
    }

    #[test]
    fn test_from_spec_builds_catalog() {
        let spec: CatalogSpec = serde_json::from_str(
            r#"{ "name": "Shop", "entities": [
                 { "name": "Order",
                   "attributes": [ { "name": "total", "type": "Real" } ],
                   "associations": [ { "role": "customer", "target": "Customer" } ] },
                 { "name": "Customer" } ] }"#,
        ).unwrap();
        let c = Catalog::from_spec(&spec, Side::Target).unwrap();
        let order = c.entity_id("Order").unwrap();
        let assoc = c.association(c.find_role(order, "customer").unwrap());
        assert_eq!(assoc.card1, Cardinality::Many);
        assert_eq!(assoc.card2, Cardinality::One);
    }

    #[test]
    #[should_panic]
    fn test_duplicate_entity_panics() {
        let mut c = Catalog::new("Dup", Side::Source);
        c.add_entity("A").add_entity("A");
    }
}
