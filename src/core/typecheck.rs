// =============================================================================
// TYPECHECK — Cohérence des catalogues et typage des cas d'utilisation
// =============================================================================
//
// Deux vérifications :
//
//   1. validate_catalog : le métamodèle est-il bien formé ?
//      - pas de cycle d'héritage
//      - pas deux caractéristiques de même nom sur une entité, héritage
//        compris
//
//   2. typecheck_use_case : chaque contrainte a-t-elle un sens vis-à-vis des
//      deux catalogues ? Le typage RÉSOUT les nœuds au passage :
//
//      ┌──────────────────┬────────────────────────────────────────────┐
//      │ nom nu `n`       │ variable (let, quantificateur, self)       │
//      │                  │ sinon attribut de self, rôle de self,      │
//      │                  │ sinon classe                               │
//      │ `o.n`            │ attribut de o, sinon rôle de o             │
//      │ `C[k]`           │ objet de C de clé k                        │
//      └──────────────────┴────────────────────────────────────────────┘
//
//      et remplit le type et l'entité de contexte de chaque nœud.
//
// Un nom de classe présent des deux côtés désigne la SOURCE comme
// propriétaire d'une règle et la CIBLE dans les expressions. Un type déjà
// posé sur un nœud (par le synthétiseur) prime.
//
// Les erreurs sont collectées contrainte par contrainte : une règle
// invalide est signalée, les autres restent utilisables.
//
// =============================================================================

use std::collections::HashSet;

use super::catalog::{Catalog, EntityRef, Side, KEY_ATTRIBUTE};
use super::expr::{BinOp, Constraint, Expr, ExprKind, Quantifier, UseCase};
use super::typeside::{Type, Value};
use crate::error::{CatalogError, TypeCheckError};

/// Vérifie qu'un catalogue est bien formé.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), Vec<CatalogError>> {
    let mut errors = Vec::new();

    for (id, entity) in catalog.entities() {
        // Cycle : une super-classe directe qui se conforme à l'entité
        if entity.superclasses.iter().any(|&s| catalog.conforms_to(s, id)) {
            errors.push(CatalogError::InheritanceCycle(entity.name.clone()));
            continue;
        }

        let mut seen = HashSet::new();
        let features = catalog
            .all_attributes(id)
            .into_iter()
            .map(|a| catalog.attribute(a).name.as_str())
            .chain(
                catalog
                    .all_associations(id)
                    .into_iter()
                    .map(|a| catalog.association(a).role2.as_str()),
            );
        for feature in features {
            if !seen.insert(feature) {
                errors.push(CatalogError::FeatureClash {
                    entity: entity.name.clone(),
                    feature: feature.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Type et résout toutes les contraintes d'un cas d'utilisation.
///
/// Retourne les diagnostics ; une liste vide signifie que tout est typé.
pub fn typecheck_use_case(use_case: &mut UseCase, source: &Catalog, target: &Catalog) -> Vec<TypeCheckError> {
    let checker = TypeChecker { source, target };
    let mut diagnostics = Vec::new();
    for (index, constraint) in use_case.constraints.iter_mut().enumerate() {
        for message in checker.check_constraint(constraint) {
            diagnostics.push(TypeCheckError {
                index,
                owner: constraint.owner.clone(),
                message,
            });
        }
    }
    diagnostics
}

/// Portée d'une contrainte : l'entité self et les variables liées.
struct Scope {
    this: EntityRef,
    vars: Vec<(String, Type)>,
}

impl Scope {
    fn lookup(&self, name: &str) -> Option<&Type> {
        self.vars.iter().rev().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

struct TypeChecker<'a> {
    source: &'a Catalog,
    target: &'a Catalog,
}

impl<'a> TypeChecker<'a> {
    fn catalog(&self, side: Side) -> &'a Catalog {
        match side {
            Side::Source => self.source,
            Side::Target => self.target,
        }
    }

    /// Cherche une classe par son nom, dans l'ordre de préférence donné.
    fn class(&self, name: &str, prefer: Side, hint: Option<&Type>) -> Option<EntityRef> {
        if let Some(found) = hint.and_then(|t| t.entity()).filter(|r| r.name == name) {
            return Some(found.clone());
        }
        let (first, second) = match prefer {
            Side::Source => (self.source, self.target),
            Side::Target => (self.target, self.source),
        };
        first
            .entity_id(name)
            .map(|id| first.entity_ref(id))
            .or_else(|| second.entity_id(name).map(|id| second.entity_ref(id)))
    }

    /// Conformité avec héritage : sous-typage de base, ou sous-classe du
    /// même côté.
    fn conforms(&self, sub: &Type, sup: &Type) -> bool {
        if sub.is_subtype_of(sup) {
            return true;
        }
        match (sub, sup) {
            (Type::Entity(a), Type::Entity(b)) => a.side == b.side && self.catalog(a.side).conforms_to(a.id, b.id),
            (Type::Set(a), Type::Set(b)) | (Type::Sequence(a), Type::Sequence(b)) => self.conforms(a, b),
            _ => false,
        }
    }

    fn resolve_type_name(&self, text: &str) -> Type {
        let text = text.trim();
        for (prefix, is_set) in [("Set(", true), ("Sequence(", false)] {
            if let Some(inner) = text.strip_prefix(prefix).and_then(|r| r.strip_suffix(')')) {
                let elem = Box::new(self.resolve_type_name(inner));
                return if is_set { Type::Set(elem) } else { Type::Sequence(elem) };
            }
        }
        if let Some(primitive) = Type::primitive(text) {
            return primitive;
        }
        match self.class(text, Side::Target, None) {
            Some(entity) => Type::Entity(entity),
            None => Type::Enumeration(text.to_string()),
        }
    }

    fn check_constraint(&self, constraint: &mut Constraint) -> Vec<String> {
        let mut errors = Vec::new();

        let hint = constraint.owner_ref.clone().map(Type::Entity);
        let Some(this) = self.class(&constraint.owner, Side::Source, hint.as_ref()) else {
            errors.push(format!("entité propriétaire inconnue '{}'", constraint.owner));
            return errors;
        };
        constraint.owner_ref = Some(this.clone());

        let mut scope = Scope { this, vars: Vec::new() };
        for binding in constraint.lets.iter_mut() {
            let declared = match &binding.ty {
                Some(ty) => ty.clone(),
                None => self.resolve_type_name(&binding.type_name),
            };
            binding.ty = Some(declared.clone());
            if let Some(actual) = self.check(&mut binding.expr, &mut scope, &mut errors) {
                if !self.conforms(&actual, &declared) {
                    errors.push(format!(
                        "let {} : {} reçoit une valeur de type {}",
                        binding.name, declared, actual
                    ));
                }
            }
            scope.vars.push((binding.name.clone(), declared));
        }

        for (label, expr) in [("antécédent", &mut constraint.antecedent), ("succédent", &mut constraint.succedent)] {
            if let Some(ty) = self.check(expr, &mut scope, &mut errors) {
                if ty != Type::Boolean {
                    errors.push(format!("{} de type {} au lieu de Boolean", label, ty));
                }
            }
        }
        errors
    }

    /// Type un nœud et ses descendants. `None` si une erreur a été notée.
    fn check(&self, expr: &mut Expr, scope: &mut Scope, errors: &mut Vec<String>) -> Option<Type> {
        let this = scope.this.clone();
        let hint = expr.ty.clone();

        let (ty, entity) = match &mut expr.kind {
            ExprKind::Literal(value) => (value.get_type(), this),

            ExprKind::Variable(name) => {
                let name = name.clone();
                if let Some(ty) = scope.lookup(&name).cloned() {
                    let entity = ty.entity().cloned().unwrap_or(this);
                    (ty, entity)
                } else if name == "self" {
                    (Type::Entity(this.clone()), this)
                } else if let Some(ty) = self.feature_type(&this, &name, false) {
                    // Reclassé en attribut ou rôle de self
                    expr.kind = self.feature_kind(&this, None, &name);
                    (ty, this)
                } else if let Some(class) = self.class(&name, Side::Target, hint.as_ref()) {
                    expr.kind = ExprKind::ClassRef { name, key: None };
                    (Type::Set(Box::new(Type::Entity(class))), this)
                } else {
                    errors.push(format!("nom inconnu '{}'", name));
                    return None;
                }
            }

            ExprKind::Attribute { object, name } | ExprKind::Role { object, role: name } => {
                let name = name.clone();
                let (owner, many) = match object {
                    None => (this.clone(), false),
                    Some(object) => {
                        let object_ty = self.check(object, scope, errors)?;
                        match (object_ty.entity(), object_ty.is_collection()) {
                            (Some(owner), many) => (owner.clone(), many),
                            (None, _) => {
                                errors.push(format!("'{}' appliqué à une valeur de type {}", name, object_ty));
                                return None;
                            }
                        }
                    }
                };
                let Some(ty) = self.feature_type(&owner, &name, many) else {
                    errors.push(format!("'{}' n'est ni un attribut ni un rôle de {}", name, owner.name));
                    return None;
                };
                let object = match &mut expr.kind {
                    ExprKind::Attribute { object, .. } | ExprKind::Role { object, .. } => object.take(),
                    _ => None,
                };
                expr.kind = self.feature_kind(&owner, object, &name);
                (ty, owner)
            }

            ExprKind::ClassRef { name, key } => {
                let Some(class) = self.class(name, Side::Target, hint.as_ref()) else {
                    errors.push(format!("classe inconnue '{}'", name));
                    return None;
                };
                let ty = match key {
                    None => Type::Set(Box::new(Type::Entity(class))),
                    Some(key) => {
                        let key_ty = self.check(key, scope, errors)?;
                        match key_ty {
                            Type::String => Type::Entity(class),
                            Type::Set(elem) | Type::Sequence(elem) if *elem == Type::String => {
                                Type::Set(Box::new(Type::Entity(class)))
                            }
                            other => {
                                errors.push(format!("clé de {} de type {} au lieu de String", class.name, other));
                                return None;
                            }
                        }
                    }
                };
                (ty, this)
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let left = self.check(lhs, scope, errors);
                let right = self.check(rhs, scope, errors);
                let (left, right) = (left?, right?);
                let null_side = is_null(lhs) || is_null(rhs);
                let ty = self.binary_type(op, &left, &right, null_side, errors)?;
                (ty, this)
            }

            ExprKind::SetBuilder { quantifier, var, entity, body } => {
                let Some(class) = self.class(entity, Side::Target, None) else {
                    errors.push(format!("classe inconnue '{}'", entity));
                    return None;
                };
                scope.vars.push((var.clone(), Type::Entity(class)));
                let body_ty = self.check(body, scope, errors);
                scope.vars.pop();
                if body_ty? != Type::Boolean {
                    errors.push(format!("le corps de {}{{..}} n'est pas booléen", quantifier.keyword()));
                    return None;
                }
                let ty = match quantifier {
                    Quantifier::Exists | Quantifier::ForAll => Type::Boolean,
                    Quantifier::Count => Type::Integer,
                };
                (ty, this)
            }
        };

        expr.ty = Some(ty.clone());
        expr.entity = Some(entity);
        Some(ty)
    }

    /// Type d'un attribut (clé implicite comprise) ou d'un rôle de `owner`.
    /// Sur une collection, le résultat est l'ensemble des valeurs.
    fn feature_type(&self, owner: &EntityRef, name: &str, many: bool) -> Option<Type> {
        let catalog = self.catalog(owner.side);
        let ty = if let Some(attr) = catalog.find_attribute(owner.id, name) {
            catalog.attribute(attr).ty.clone()
        } else if name == KEY_ATTRIBUTE {
            Type::String
        } else if let Some(assoc) = catalog.find_role(owner.id, name) {
            catalog.role_type(assoc)
        } else {
            return None;
        };
        Some(if many { collect(ty) } else { ty })
    }

    /// Forme résolue d'une caractéristique : `Attribute` ou `Role`.
    fn feature_kind(&self, owner: &EntityRef, object: Option<Box<Expr>>, name: &str) -> ExprKind {
        let catalog = self.catalog(owner.side);
        let is_role = catalog.find_attribute(owner.id, name).is_none()
            && name != KEY_ATTRIBUTE
            && catalog.find_role(owner.id, name).is_some();
        if is_role {
            ExprKind::Role { object, role: name.to_string() }
        } else {
            ExprKind::Attribute { object, name: name.to_string() }
        }
    }

    fn binary_type(&self, op: BinOp, left: &Type, right: &Type, null_side: bool, errors: &mut Vec<String>) -> Option<Type> {
        if op.is_logical() {
            if *left == Type::Boolean && *right == Type::Boolean {
                return Some(Type::Boolean);
            }
            errors.push(format!("'{}' entre {} et {}", op.symbol(), left, right));
            return None;
        }
        if op.is_comparison() {
            let ok = match op {
                BinOp::Eq | BinOp::Ne => null_side || self.conforms(left, right) || self.conforms(right, left),
                _ => (left.is_numeric() && right.is_numeric()) || (*left == Type::String && *right == Type::String),
            };
            if ok {
                return Some(Type::Boolean);
            }
            errors.push(format!("comparaison '{}' entre {} et {}", op.symbol(), left, right));
            return None;
        }
        // Arithmétique
        if left.is_numeric() && right.is_numeric() {
            return Some(widest(left, right));
        }
        if op == BinOp::Add && *left == Type::String && *right == Type::String {
            return Some(Type::String);
        }
        errors.push(format!("opération '{}' entre {} et {}", op.symbol(), left, right));
        None
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Value::Null))
}

fn collect(ty: Type) -> Type {
    match ty {
        Type::Set(elem) | Type::Sequence(elem) => Type::Set(elem),
        other => Type::Set(Box::new(other)),
    }
}

fn widest(a: &Type, b: &Type) -> Type {
    if a.is_subtype_of(b) {
        b.clone()
    } else {
        a.clone()
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Cardinality;
    use crate::rules::{parse_module, parse_rule};

    fn catalogs() -> (Catalog, Catalog) {
        let mut base = Catalog::new("Shop", Side::Source);
        base.add_entity("Order")
            .add_entity("Customer")
            .add_attribute("Order", "total", Type::Real)
            .add_attribute("Order", "count", Type::Integer)
            .add_attribute("Customer", "name", Type::String)
            .add_association("Order", "customer", "Customer", Cardinality::Many, Cardinality::One);
        (
            base.renamed_copy("IN", Side::Source, "IN$"),
            base.renamed_copy("OUT", Side::Target, "OUT$"),
        )
    }

    fn check(text: &str) -> (UseCase, Vec<TypeCheckError>) {
        let (src, tgt) = catalogs();
        let mut uc = parse_module(text).unwrap().into_use_case();
        let errors = typecheck_use_case(&mut uc, &src, &tgt);
        (uc, errors)
    }

    #[test]
    fn test_cycle_and_clash_are_reported() {
        let mut c = Catalog::new("Bad", Side::Source);
        c.add_entity("A").add_entity("B")
         .add_superclass("A", "B")
         .add_superclass("B", "A");
        let errors = validate_catalog(&c).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, CatalogError::InheritanceCycle(_))));

        let mut d = Catalog::new("Clash", Side::Source);
        d.add_entity("P").add_entity("Q")
         .add_superclass("Q", "P")
         .add_attribute("P", "name", Type::String)
         .add_attribute("Q", "name", Type::String);
        let errors = validate_catalog(&d).unwrap_err();
        assert_eq!(
            errors,
            vec![CatalogError::FeatureClash { entity: "Q".into(), feature: "name".into() }]
        );

        let (src, _) = catalogs();
        assert!(validate_catalog(&src).is_ok());
    }

    #[test]
    fn test_names_are_reclassified() {
        let (uc, errors) = check(
            "module M
               IN$Order :: let x : OUT$Order = OUT$Order[$id] ;
                           true => x.customer = OUT$Customer[customer.$id] ;
             end",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let rule = &uc.constraints[0];
        assert!(rule.is_resolved());
        let ExprKind::Binary { lhs, rhs, .. } = &rule.succedent.kind else { panic!() };
        assert!(matches!(lhs.kind, ExprKind::Role { .. }));
        let ExprKind::ClassRef { key: Some(key), .. } = &rhs.kind else { panic!() };
        let ExprKind::Attribute { object: Some(object), .. } = &key.kind else { panic!() };
        assert!(matches!(object.kind, ExprKind::Role { object: None, .. }));
        assert_eq!(rule.lets[0].ty.as_ref().map(|t| t.name()), Some("OUT$Order"));
    }

    #[test]
    fn test_bad_rule_does_not_hide_good_ones() {
        let (uc, errors) = check(
            "module M
               IN$Order :: true => total >= 0 ;
               IN$Order :: true => nothing = 1 ;
               IN$Order :: true => total + count > 2 ;
             end",
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 1);
        assert!(errors[0].message.contains("nothing"));
        assert!(uc.constraints[0].is_resolved());
        assert!(uc.constraints[2].is_resolved());
    }

    #[test]
    fn test_type_mismatches() {
        let (_, errors) = check(
            "module M
               IN$Order :: true => total = \"abc\" ;
               IN$Order :: total => true ;
               IN$Customer :: true => exists{o : IN$Order | o.customer = self & o.count > 1} ;
             end",
        );
        let indices: Vec<usize> = errors.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_unknown_owner() {
        let (src, tgt) = catalogs();
        let rule = parse_rule("Ghost :: true => true ;").unwrap();
        let mut uc = UseCase { name: "M".into(), constraints: vec![rule] };
        let errors = typecheck_use_case(&mut uc, &src, &tgt);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Ghost"));
    }

    #[test]
    fn test_count_and_null() {
        let (_, errors) = check(
            "module M
               IN$Customer :: true => #{o : IN$Order | o.customer = self} >= 0 ;
               IN$Order :: customer /= null => customer.name = customer.name ;
             end",
        );
        assert!(errors.is_empty(), "{:?}", errors);
    }
}
