// =============================================================================
// EXECUTE — Interpréteur de règles sur les graphes d'objets
// =============================================================================
//
// Exécute un UseCase sur une instance source et construit l'instance
// cible. Chaque contrainte est lue comme une règle de production :
//
//   Owner :: let x : T = e ; antécédent => succédent ;
//
//   pour chaque objet `self` de l'extension de Owner :
//     1. lier les `let` dans l'ordre
//     2. si l'antécédent est faux, passer au suivant
//     3. ÉTABLIR le succédent
//
// ÉTABLIR UN SUCCÉDENT :
//
//   a & b                 établir a, puis b
//   exists{x : T | corps} si un objet de T satisfait le corps : rien
//                         sinon créer un objet de T, lier x, établir le corps
//   o.f = e               si déjà vrai : rien ; sinon AFFECTER e à o.f
//                         (attribut → valeur, rôle → liens)
//   autre                 évalué ; s'il est faux, violation signalée
//
// EXEMPLE (les deux phases de la synthèse) :
//
//   Order :: true => exists{x : OUT$Order | x.$id = $id & x.total = total} ;
//     → un OUT$Order par Order, même clé, même total
//
//   Order :: let x : OUT$Order = OUT$Order[$id] ; true =>
//            x.customer = OUT$Customer[customer.$id] ;
//     → retrouve les deux objets créés par leur clé et les relie
//
// L'interpréteur ne dépend pas du typage : un nom nu est cherché dans
// l'environnement, puis comme attribut ou rôle de `self`, puis comme
// classe. Un nœud déjà typé sert seulement d'indice pour les classes.
//
// =============================================================================

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use super::catalog::{Catalog, EntityRef, Side, KEY_ATTRIBUTE};
use super::expr::{BinOp, Constraint, Expr, ExprKind, Quantifier, UseCase};
use super::instance::{Instance, ObjRef};
use super::typeside::{Type, Value};
use crate::error::ExecutionError;

/// Valeur manipulée pendant l'exécution
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Value(Value),
    Object(ObjRef),
    Collection(Vec<Datum>),
}

impl Datum {
    fn null() -> Self {
        Datum::Value(Value::Null)
    }

    fn boolean(b: bool) -> Self {
        Datum::Value(Value::Boolean(b))
    }

    fn is_null(&self) -> bool {
        matches!(self, Datum::Value(Value::Null))
    }

    /// Objets désignés : un objet, les objets d'une collection, rien pour null.
    fn objects(&self) -> Result<Vec<ObjRef>, ExecutionError> {
        match self {
            Datum::Object(obj) => Ok(vec![*obj]),
            Datum::Value(Value::Null) => Ok(Vec::new()),
            Datum::Collection(items) => items
                .iter()
                .filter(|d| !d.is_null())
                .map(|d| match d {
                    Datum::Object(obj) => Ok(*obj),
                    other => Err(ExecutionError::TypeMismatch(format!("objet attendu, trouvé {:?}", other))),
                })
                .collect(),
            Datum::Value(other) => Err(ExecutionError::TypeMismatch(format!("objet attendu, trouvé {}", other))),
        }
    }
}

/// Bilan d'une exécution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Couples (contrainte, self) dont l'antécédent était vrai
    pub fired: usize,
    /// Objets créés par les `exists`
    pub created: usize,
    /// Affectations d'attributs ou de liens
    pub assigned: usize,
    /// Succédents restés faux
    pub violations: Vec<String>,
}

/// Résultat : les deux instances après exécution, et le bilan.
#[derive(Debug, Clone)]
pub struct Execution {
    pub source: Instance,
    pub target: Instance,
    pub report: ExecutionReport,
}

/// Exécute toutes les contraintes du cas d'utilisation, dans l'ordre.
///
/// L'instance cible part vide. Une erreur (clé absente, nom inconnu)
/// arrête l'exécution.
pub fn execute(
    use_case: &UseCase,
    source: &Catalog,
    target: &Catalog,
    input: &Instance,
) -> Result<Execution, ExecutionError> {
    if input.side != Side::Source || input.catalog_name != source.name {
        return Err(ExecutionError::TypeMismatch(format!(
            "l'instance {} ne peuple pas le catalogue source {}",
            input.name, source.name
        )));
    }

    let mut interpreter = Interpreter {
        source,
        target,
        source_data: input.clone(),
        target_data: Instance::new(&target.name, target),
        report: ExecutionReport::default(),
    };
    for (index, constraint) in use_case.constraints.iter().enumerate() {
        interpreter.run_constraint(index, constraint)?;
    }

    let report = interpreter.report;
    info!(
        use_case = %use_case.name,
        fired = report.fired,
        created = report.created,
        assigned = report.assigned,
        violations = report.violations.len(),
        "exécution terminée"
    );
    Ok(Execution {
        source: interpreter.source_data,
        target: interpreter.target_data,
        report,
    })
}

/// Variables liées autour d'un objet `self`
struct Env {
    this: ObjRef,
    vars: Vec<(String, Datum)>,
}

impl Env {
    fn lookup(&self, name: &str) -> Option<Datum> {
        if let Some((_, d)) = self.vars.iter().rev().find(|(n, _)| n == name) {
            return Some(d.clone());
        }
        (name == "self").then_some(Datum::Object(self.this))
    }
}

struct Interpreter<'a> {
    source: &'a Catalog,
    target: &'a Catalog,
    source_data: Instance,
    target_data: Instance,
    report: ExecutionReport,
}

impl<'a> Interpreter<'a> {
    fn catalog(&self, side: Side) -> &'a Catalog {
        match side {
            Side::Source => self.source,
            Side::Target => self.target,
        }
    }

    fn instance(&self, side: Side) -> &Instance {
        match side {
            Side::Source => &self.source_data,
            Side::Target => &self.target_data,
        }
    }

    fn instance_mut(&mut self, side: Side) -> &mut Instance {
        match side {
            Side::Source => &mut self.source_data,
            Side::Target => &mut self.target_data,
        }
    }

    fn extent(&self, class: &EntityRef) -> Vec<ObjRef> {
        self.instance(class.side).extent(self.catalog(class.side), class.id)
    }

    // -------------------------------------------------------------------------
    // Résolution des noms
    // -------------------------------------------------------------------------

    /// Entité propriétaire : la référence résolue, sinon le nom côté source.
    fn owner(&self, constraint: &Constraint) -> Result<EntityRef, ExecutionError> {
        if let Some(owner) = &constraint.owner_ref {
            return Ok(owner.clone());
        }
        self.find_class(&constraint.owner, Side::Source)
            .ok_or_else(|| ExecutionError::UnknownEntity(constraint.owner.clone()))
    }

    /// Classe nommée dans une expression : l'indice de type, sinon la cible
    /// d'abord.
    fn class(&self, name: &str, hint: Option<&Type>) -> Result<EntityRef, ExecutionError> {
        if let Some(found) = hint.and_then(Type::entity).filter(|r| r.name == name) {
            return Ok(found.clone());
        }
        self.find_class(name, Side::Target)
            .ok_or_else(|| ExecutionError::UnknownEntity(name.to_string()))
    }

    fn find_class(&self, name: &str, prefer: Side) -> Option<EntityRef> {
        let (first, second) = match prefer {
            Side::Source => (self.source, self.target),
            Side::Target => (self.target, self.source),
        };
        first
            .entity_id(name)
            .map(|id| first.entity_ref(id))
            .or_else(|| second.entity_id(name).map(|id| second.entity_ref(id)))
    }

    fn has_feature(&self, obj: ObjRef, name: &str) -> bool {
        let catalog = self.catalog(obj.side);
        name == KEY_ATTRIBUTE
            || catalog.find_attribute(obj.entity, name).is_some()
            || catalog.find_role(obj.entity, name).is_some()
    }

    fn unknown_feature(&self, obj: ObjRef, name: &str) -> ExecutionError {
        ExecutionError::UnknownFeature {
            entity: self.instance(obj.side).entity_name(obj.entity).to_string(),
            feature: name.to_string(),
        }
    }

    // -------------------------------------------------------------------------
    // Règles
    // -------------------------------------------------------------------------

    fn run_constraint(&mut self, index: usize, constraint: &Constraint) -> Result<(), ExecutionError> {
        let owner = self.owner(constraint)?;
        let objects = self.extent(&owner);
        debug!(index, owner = %owner, objects = objects.len(), phase = %constraint.phase, "règle");

        for this in objects {
            let mut env = Env { this, vars: Vec::new() };
            for binding in &constraint.lets {
                let value = self.eval(&binding.expr, &mut env)?;
                env.vars.push((binding.name.clone(), value));
            }
            if !self.truth(&constraint.antecedent, &mut env)? {
                continue;
            }
            self.report.fired += 1;
            self.establish(index, &constraint.succedent, &mut env)?;
        }
        Ok(())
    }

    fn establish(&mut self, index: usize, expr: &Expr, env: &mut Env) -> Result<(), ExecutionError> {
        match &expr.kind {
            ExprKind::Binary { op: BinOp::And, lhs, rhs } => {
                self.establish(index, lhs, env)?;
                self.establish(index, rhs, env)
            }

            ExprKind::SetBuilder { quantifier: Quantifier::Exists, var, entity, body } => {
                let class = self.class(entity, None)?;
                for candidate in self.extent(&class) {
                    env.vars.push((var.clone(), Datum::Object(candidate)));
                    let found = self.truth(body, env);
                    env.vars.pop();
                    if found? {
                        return Ok(());
                    }
                }

                let declared = self.catalog(class.side).entity(class.id);
                if declared.is_abstract || declared.is_interface {
                    return Err(ExecutionError::NotExecutable(format!(
                        "création d'un objet de la classe abstraite {}",
                        class.name
                    )));
                }
                let created = self.instance_mut(class.side).create(class.id);
                self.report.created += 1;
                debug!(class = %class.name, row = created.row, "objet créé");

                env.vars.push((var.clone(), Datum::Object(created)));
                let result = self.establish(index, body, env);
                env.vars.pop();
                result
            }

            ExprKind::Binary { op: BinOp::Eq, lhs, rhs } => {
                if self.truth(expr, env)? {
                    return Ok(());
                }
                match self.place(lhs, env)? {
                    Some((obj, feature)) => {
                        let value = self.eval(rhs, env)?;
                        self.assign(obj, &feature, value)
                    }
                    None => {
                        self.violation(index, expr, env);
                        Ok(())
                    }
                }
            }

            _ => match self.eval(expr, env)? {
                Datum::Value(Value::Boolean(true)) => Ok(()),
                Datum::Value(Value::Boolean(false)) | Datum::Value(Value::Null) => {
                    self.violation(index, expr, env);
                    Ok(())
                }
                _ => Err(ExecutionError::NotExecutable(expr.to_string())),
            },
        }
    }

    fn violation(&mut self, index: usize, expr: &Expr, env: &Env) {
        let message = format!(
            "règle {} : '{}' faux pour {}",
            index,
            expr,
            self.instance(env.this.side).label(env.this)
        );
        warn!("{}", message);
        self.report.violations.push(message);
    }

    /// Emplacement affectable désigné par le membre gauche d'une égalité.
    fn place(&self, lhs: &Expr, env: &mut Env) -> Result<Option<(ObjRef, String)>, ExecutionError> {
        match &lhs.kind {
            ExprKind::Attribute { object, name } | ExprKind::Role { object, role: name } => {
                let base = match object {
                    None => Datum::Object(env.this),
                    Some(object) => self.eval(object, env)?,
                };
                Ok(match base {
                    Datum::Object(obj) => Some((obj, name.clone())),
                    _ => None,
                })
            }
            ExprKind::Variable(name) if env.lookup(name).is_none() && self.has_feature(env.this, name) => {
                Ok(Some((env.this, name.clone())))
            }
            _ => Ok(None),
        }
    }

    fn assign(&mut self, obj: ObjRef, feature: &str, value: Datum) -> Result<(), ExecutionError> {
        let catalog = self.catalog(obj.side);
        if let Some(assoc) = catalog.find_role(obj.entity, feature) {
            let targets = value.objects()?;
            if !catalog.association(assoc).card2.is_many() && targets.len() > 1 {
                return Err(ExecutionError::TypeMismatch(format!(
                    "{} objets pour le rôle mono-valué '{}'",
                    targets.len(),
                    feature
                )));
            }
            if targets.iter().any(|t| t.side != obj.side) {
                return Err(ExecutionError::TypeMismatch(format!(
                    "lien '{}' entre deux côtés différents",
                    feature
                )));
            }
            self.instance_mut(obj.side).set_links(obj, feature, targets);
        } else if feature == KEY_ATTRIBUTE || catalog.find_attribute(obj.entity, feature).is_some() {
            let Datum::Value(value) = value else {
                return Err(ExecutionError::TypeMismatch(format!(
                    "valeur attendue pour l'attribut '{}'",
                    feature
                )));
            };
            self.instance_mut(obj.side).set_attr(obj, feature, value);
        } else {
            return Err(self.unknown_feature(obj, feature));
        }
        self.report.assigned += 1;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Évaluation
    // -------------------------------------------------------------------------

    /// Évalue une condition ; null compte pour faux.
    fn truth(&self, expr: &Expr, env: &mut Env) -> Result<bool, ExecutionError> {
        match self.eval(expr, env)? {
            Datum::Value(Value::Boolean(b)) => Ok(b),
            Datum::Value(Value::Null) => Ok(false),
            other => Err(ExecutionError::TypeMismatch(format!(
                "'{}' n'est pas booléen ({:?})",
                expr, other
            ))),
        }
    }

    fn eval(&self, expr: &Expr, env: &mut Env) -> Result<Datum, ExecutionError> {
        match &expr.kind {
            ExprKind::Literal(value) => Ok(Datum::Value(value.clone())),

            ExprKind::Variable(name) => {
                if let Some(bound) = env.lookup(name) {
                    return Ok(bound);
                }
                if self.has_feature(env.this, name) {
                    return self.read(Datum::Object(env.this), name);
                }
                match self.class(name, expr.ty.as_ref()) {
                    Ok(class) => Ok(Datum::Collection(self.extent(&class).into_iter().map(Datum::Object).collect())),
                    Err(_) => Err(ExecutionError::UnboundVariable(name.clone())),
                }
            }

            ExprKind::Attribute { object, name } | ExprKind::Role { object, role: name } => {
                let base = match object {
                    None => Datum::Object(env.this),
                    Some(object) => self.eval(object, env)?,
                };
                self.read(base, name)
            }

            ExprKind::ClassRef { name, key } => {
                let class = self.class(name, expr.ty.as_ref())?;
                match key {
                    None => Ok(Datum::Collection(self.extent(&class).into_iter().map(Datum::Object).collect())),
                    Some(key) => {
                        let key = self.eval(key, env)?;
                        self.lookup_key(&class, key)
                    }
                }
            }

            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, env),

            ExprKind::SetBuilder { quantifier, var, entity, body } => {
                let class = self.class(entity, None)?;
                let mut count: i64 = 0;
                for candidate in self.extent(&class) {
                    env.vars.push((var.clone(), Datum::Object(candidate)));
                    let holds = self.truth(body, env);
                    env.vars.pop();
                    let holds = holds?;
                    match quantifier {
                        Quantifier::Exists if holds => return Ok(Datum::boolean(true)),
                        Quantifier::ForAll if !holds => return Ok(Datum::boolean(false)),
                        Quantifier::Count if holds => count += 1,
                        _ => {}
                    }
                }
                Ok(match quantifier {
                    Quantifier::Exists => Datum::boolean(false),
                    Quantifier::ForAll => Datum::boolean(true),
                    Quantifier::Count => Datum::Value(Value::Integer(count)),
                })
            }
        }
    }

    /// Lit un attribut ou un rôle. Sur null le résultat est null ; sur une
    /// collection, les résultats sont aplatis.
    fn read(&self, base: Datum, name: &str) -> Result<Datum, ExecutionError> {
        match base {
            Datum::Value(Value::Null) => Ok(Datum::null()),
            Datum::Object(obj) => self.feature(obj, name),
            Datum::Collection(items) => {
                let mut out = Vec::new();
                for item in items {
                    match self.read(item, name)? {
                        Datum::Collection(inner) => out.extend(inner),
                        d if d.is_null() => {}
                        d => out.push(d),
                    }
                }
                Ok(Datum::Collection(out))
            }
            Datum::Value(other) => Err(ExecutionError::TypeMismatch(format!(
                "lecture de '{}' sur la valeur {}",
                name, other
            ))),
        }
    }

    fn feature(&self, obj: ObjRef, name: &str) -> Result<Datum, ExecutionError> {
        let catalog = self.catalog(obj.side);
        let instance = self.instance(obj.side);
        if name == KEY_ATTRIBUTE || catalog.find_attribute(obj.entity, name).is_some() {
            return Ok(instance.get_attr(obj, name).cloned().map_or_else(Datum::null, Datum::Value));
        }
        let Some(assoc) = catalog.find_role(obj.entity, name) else {
            return Err(self.unknown_feature(obj, name));
        };
        let links = instance.get_links(obj, name);
        if catalog.association(assoc).card2.is_many() {
            Ok(Datum::Collection(links.iter().copied().map(Datum::Object).collect()))
        } else {
            Ok(links.first().copied().map_or_else(Datum::null, Datum::Object))
        }
    }

    /// `Classe[clé]` : une clé donne un objet, une collection de clés des objets.
    fn lookup_key(&self, class: &EntityRef, key: Datum) -> Result<Datum, ExecutionError> {
        match key {
            Datum::Value(Value::Null) => Ok(Datum::null()),
            Datum::Value(value) => {
                let catalog = self.catalog(class.side);
                self.instance(class.side)
                    .find_by_key(catalog, class.id, &value)
                    .map(Datum::Object)
                    .ok_or_else(|| ExecutionError::MissingKey {
                        entity: class.name.clone(),
                        key: match value {
                            Value::String(s) => s,
                            other => other.to_string(),
                        },
                    })
            }
            Datum::Collection(keys) => {
                let mut found = Vec::new();
                for key in keys {
                    match self.lookup_key(class, key)? {
                        d if d.is_null() => {}
                        d => found.push(d),
                    }
                }
                Ok(Datum::Collection(found))
            }
            Datum::Object(_) => Err(ExecutionError::TypeMismatch(format!(
                "un objet ne peut pas servir de clé pour {}",
                class.name
            ))),
        }
    }

    fn binary(&self, op: BinOp, lhs: &Expr, rhs: &Expr, env: &mut Env) -> Result<Datum, ExecutionError> {
        match op {
            BinOp::And => Ok(Datum::boolean(self.truth(lhs, env)? && self.truth(rhs, env)?)),
            BinOp::Or => Ok(Datum::boolean(self.truth(lhs, env)? || self.truth(rhs, env)?)),
            BinOp::Implies => Ok(Datum::boolean(!self.truth(lhs, env)? || self.truth(rhs, env)?)),
            _ => {
                let left = self.eval(lhs, env)?;
                let right = self.eval(rhs, env)?;
                match op {
                    BinOp::Eq => Ok(Datum::boolean(datum_eq(&left, &right))),
                    BinOp::Ne => Ok(Datum::boolean(!datum_eq(&left, &right))),
                    BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                        let holds = compare(&left, &right)?.is_some_and(|ord| match op {
                            BinOp::Lt => ord == Ordering::Less,
                            BinOp::Gt => ord == Ordering::Greater,
                            BinOp::Le => ord != Ordering::Greater,
                            _ => ord != Ordering::Less,
                        });
                        Ok(Datum::boolean(holds))
                    }
                    _ => arithmetic(op, left, right),
                }
            }
        }
    }
}

// =============================================================================
// Opérations sur les valeurs
// =============================================================================

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Real(r) => Some(*r),
        _ => None,
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Égalité ensembliste pour les collections ; un singleton vaut son
/// élément, null vaut la collection vide.
fn datum_eq(a: &Datum, b: &Datum) -> bool {
    match (a, b) {
        (Datum::Value(x), Datum::Value(y)) => value_eq(x, y),
        (Datum::Object(x), Datum::Object(y)) => x == y,
        (Datum::Collection(xs), Datum::Collection(ys)) => {
            xs.iter().all(|x| ys.iter().any(|y| datum_eq(x, y)))
                && ys.iter().all(|y| xs.iter().any(|x| datum_eq(x, y)))
        }
        (Datum::Collection(xs), single) | (single, Datum::Collection(xs)) => {
            if single.is_null() {
                xs.is_empty()
            } else {
                xs.len() == 1 && datum_eq(&xs[0], single)
            }
        }
        _ => false,
    }
}

/// Ordre entre deux valeurs ; `None` si l'une est null.
fn compare(a: &Datum, b: &Datum) -> Result<Option<Ordering>, ExecutionError> {
    match (a, b) {
        (Datum::Value(Value::Null), _) | (_, Datum::Value(Value::Null)) => Ok(None),
        (Datum::Value(Value::String(x)), Datum::Value(Value::String(y))) => Ok(Some(x.cmp(y))),
        (Datum::Value(x), Datum::Value(y)) => match (numeric(x), numeric(y)) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
            _ => Err(ExecutionError::TypeMismatch(format!("comparaison de {} et {}", x, y))),
        },
        _ => Err(ExecutionError::TypeMismatch("comparaison d'objets".to_string())),
    }
}

fn arithmetic(op: BinOp, left: Datum, right: Datum) -> Result<Datum, ExecutionError> {
    let (Datum::Value(x), Datum::Value(y)) = (left, right) else {
        return Err(ExecutionError::TypeMismatch(format!("opérande objet pour '{}'", op.symbol())));
    };
    let overflow = || ExecutionError::TypeMismatch(format!("dépassement sur '{}'", op.symbol()));
    let result = match (&x, &y) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::String(a), Value::String(b)) if op == BinOp::Add => Value::String(format!("{}{}", a, b)),
        (Value::Integer(a), Value::Integer(b)) => match op {
            BinOp::Add => Value::Integer(a.checked_add(*b).ok_or_else(overflow)?),
            BinOp::Sub => Value::Integer(a.checked_sub(*b).ok_or_else(overflow)?),
            BinOp::Mul => Value::Integer(a.checked_mul(*b).ok_or_else(overflow)?),
            _ if *b == 0 => return Err(ExecutionError::TypeMismatch("division par zéro".to_string())),
            _ => Value::Integer(a / b),
        },
        _ => match (numeric(&x), numeric(&y)) {
            (Some(a), Some(b)) => Value::Real(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                _ if b == 0.0 => return Err(ExecutionError::TypeMismatch("division par zéro".to_string())),
                _ => a / b,
            }),
            _ => {
                return Err(ExecutionError::TypeMismatch(format!(
                    "'{}' entre {} et {}",
                    op.symbol(),
                    x,
                    y
                )))
            }
        },
    };
    Ok(Datum::Value(result))
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Cardinality;
    use crate::core::score::MappingPlan;
    use crate::core::synthesize::synthesize;
    use crate::core::correspondence::EntityMap;
    use crate::rules::parse_module;
    use pretty_assertions::assert_eq;

    fn shop(name: &str, side: Side) -> Catalog {
        let mut c = Catalog::new(name, side);
        c.add_entity("Order")
         .add_entity("Customer")
         .add_attribute("Order", "total", Type::Real)
         .add_attribute("Customer", "name", Type::String)
         .add_association("Order", "customer", "Customer", Cardinality::Many, Cardinality::One);
        c
    }

    fn shop_data(catalog: &Catalog) -> Instance {
        let mut inst = Instance::new("ShopData", catalog);
        let ada = inst.insert(catalog, "Customer", &[("$id", Value::String("c1".into())), ("name", Value::String("Ada".into()))]);
        let o1 = inst.insert(catalog, "Order", &[("$id", Value::String("o1".into())), ("total", Value::Real(12.5))]);
        inst.insert(catalog, "Order", &[("$id", Value::String("o2".into())), ("total", Value::Real(3.0))]);
        inst.link(o1, "customer", ada);
        inst
    }

    fn identity_plan(src: &Catalog, tgt: &Catalog) -> MappingPlan {
        let mut mu = EntityMap::new();
        for (e, entity) in src.entities() {
            let t = tgt.entity_id(&entity.name).unwrap();
            mu.try_insert(e, t);
        }
        MappingPlan::from_entity_map(src, tgt, mu)
    }

    #[test]
    fn test_synthesized_rules_copy_the_graph() {
        let src = shop("S", Side::Source);
        let tgt = shop("T", Side::Target);
        let plan = identity_plan(&src, &tgt);
        let use_case = synthesize(&src, &tgt, &plan).unwrap().into_use_case("Copy");

        let run = execute(&use_case, &src, &tgt, &shop_data(&src)).unwrap();
        assert_eq!(run.target.total_objects(), 3);
        assert_eq!(run.report.created, 3);
        assert!(run.report.violations.is_empty());

        let order = tgt.entity_id("Order").unwrap();
        let o1 = run.target.find_by_key(&tgt, order, &Value::String("o1".into())).unwrap();
        assert_eq!(run.target.get_attr(o1, "total"), Some(&Value::Real(12.5)));
        let linked = run.target.get_links(o1, "customer");
        assert_eq!(linked.len(), 1);
        assert_eq!(run.target.key_of(linked[0]), Some(&Value::String("c1".into())));
        assert_eq!(linked[0].side, Side::Target);

        // Sans client source, pas de lien cible
        let o2 = run.target.find_by_key(&tgt, order, &Value::String("o2".into())).unwrap();
        assert!(run.target.get_links(o2, "customer").is_empty());
    }

    #[test]
    fn test_second_run_creates_nothing() {
        let src = shop("S", Side::Source);
        let tgt = shop("T", Side::Target);
        let plan = identity_plan(&src, &tgt);
        let mut use_case = synthesize(&src, &tgt, &plan).unwrap().into_use_case("Copy");
        // Les règles dupliquées trouvent les objets déjà créés
        let again = use_case.constraints.clone();
        use_case.constraints.extend(again);

        let run = execute(&use_case, &src, &tgt, &shop_data(&src)).unwrap();
        assert_eq!(run.report.created, 3);
        assert_eq!(run.target.total_objects(), 3);
    }

    #[test]
    fn test_module_rules_without_typing() {
        let src = shop("S", Side::Source);
        let tgt = shop("T", Side::Target);
        let module = parse_module(
            "module Checks
               Order :: true => total >= 0 ;
               Order :: total > 10 => total < 5 ;
               Customer :: #{o : Order | o.customer = self} = 1 => name = \"Ada\" ;
             end",
        )
        .unwrap();
        // Les deux côtés ont un `Order` : le propriétaire est pris côté source,
        // la classe du `#{..}` côté cible (vide ici).
        let run = execute(&module.into_use_case(), &src, &tgt, &shop_data(&src)).unwrap();
        assert_eq!(run.report.fired, 3);
        assert_eq!(run.report.violations.len(), 1);
        assert!(run.report.violations[0].contains("total < 5"));
        assert_eq!(run.target.total_objects(), 0);
    }

    #[test]
    fn test_assignment_on_self_feature() {
        let src = shop("S", Side::Source);
        let tgt = shop("T", Side::Target);
        let module = parse_module("module M Order :: total < 5 => total = total * 2 ; end").unwrap();
        let run = execute(&module.into_use_case(), &src, &tgt, &shop_data(&src)).unwrap();
        let order = src.entity_id("Order").unwrap();
        let o2 = run.source.find_by_key(&src, order, &Value::String("o2".into())).unwrap();
        assert_eq!(run.source.get_attr(o2, "total"), Some(&Value::Real(6.0)));
        assert_eq!(run.report.assigned, 1);
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let src = shop("S", Side::Source);
        let tgt = shop("T", Side::Target);
        let module = parse_module("module M Order :: let x : Order = Order[$id] ; true => x.total = total ; end").unwrap();
        let err = execute(&module.into_use_case(), &src, &tgt, &shop_data(&src)).unwrap_err();
        assert!(matches!(err, ExecutionError::MissingKey { ref key, .. } if key == "o1"));
    }

    #[test]
    fn test_unbound_names_and_wrong_instance() {
        let src = shop("S", Side::Source);
        let tgt = shop("T", Side::Target);
        let module = parse_module("module M Order :: true => x.weight = 1 ; end").unwrap();
        let err = execute(&module.into_use_case(), &src, &tgt, &shop_data(&src)).unwrap_err();
        assert!(matches!(err, ExecutionError::UnboundVariable(ref v) if v == "x"));

        let module = parse_module("module M Order :: weight = 1 => true ; end").unwrap();
        let err = execute(&module.into_use_case(), &src, &tgt, &shop_data(&src)).unwrap_err();
        assert!(matches!(err, ExecutionError::UnboundVariable(_)));

        let other = Instance::new("Other", &tgt);
        let empty = UseCase::new("Empty");
        assert!(execute(&empty, &src, &tgt, &other).is_err());
    }

    #[test]
    fn test_value_semantics() {
        assert!(value_eq(&Value::Integer(2), &Value::Real(2.0)));
        assert!(datum_eq(&Datum::null(), &Datum::Collection(Vec::new())));
        assert_eq!(
            arithmetic(BinOp::Add, Datum::Value(Value::String("a".into())), Datum::Value(Value::String("b".into()))).unwrap(),
            Datum::Value(Value::String("ab".into()))
        );
        assert_eq!(
            arithmetic(BinOp::Div, Datum::Value(Value::Integer(7)), Datum::Value(Value::Integer(2))).unwrap(),
            Datum::Value(Value::Integer(3))
        );
        assert!(arithmetic(BinOp::Div, Datum::Value(Value::Integer(1)), Datum::Value(Value::Integer(0))).is_err());
        assert_eq!(compare(&Datum::null(), &Datum::Value(Value::Integer(1))).unwrap(), None);
    }
}
