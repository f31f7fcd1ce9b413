// =============================================================================
// EXPR — Arbre des expressions, contraintes et cas d'utilisation
// =============================================================================
//
// Un cas d'utilisation est une suite ordonnée de CONTRAINTES. Chaque
// contrainte est portée par une entité (le contexte `self`) et se lit :
//
//   Owner :: let x : T = expr ; antécédent => succédent ;
//
// Pour chaque objet de Owner, si l'antécédent est vrai, le succédent doit
// l'être. Un interpréteur rend le succédent vrai en créant des objets et en
// affectant des caractéristiques.
//
// Les expressions forment un type somme FERMÉ :
//
//   ClassRef   Customer, Customer[$id]     (classe, ou recherche par clé)
//   Attribute  x.total, total              (objet absent = self)
//   Role       x.customer, customer
//   Variable   x
//   Literal    true, 3, 2.5, "abc", null
//   Binary     a = b, a & b, a + b ...
//   SetBuilder exists{x : T | corps}, forall{...}, #{...}
//
// Chaque nœud porte un type et une entité de contexte OPTIONNELS : le
// lecteur de modules les laisse vides, le synthétiseur et le typage les
// remplissent.
//
// L'affichage produit la syntaxe des modules de règles : une contrainte
// imprimée se relit telle quelle.
//
// =============================================================================

use std::fmt;

use serde::Serialize;

use super::catalog::{EntityRef, KEY_ATTRIBUTE};
use super::typeside::{Type, Value};

/// Opérateurs binaires, du moins au plus prioritaire :
/// `implies`, `or`, `&`, comparaisons, `+ -`, `* /`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Implies,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::Ne => "/=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&",
            BinOp::Or => "or",
            BinOp::Implies => "implies",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            BinOp::Implies => 1,
            BinOp::Or => 2,
            BinOp::And => 3,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div => 6,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 4
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or | BinOp::Implies)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.precedence() >= 5
    }
}

/// Quantificateur d'un ensemble en compréhension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Quantifier {
    Exists,
    ForAll,
    Count,
}

impl Quantifier {
    pub fn keyword(&self) -> &'static str {
        match self {
            Quantifier::Exists => "exists",
            Quantifier::ForAll => "forall",
            Quantifier::Count => "#",
        }
    }
}

/// Les variantes de l'arbre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    /// Référence à une classe, éventuellement indexée par une clé
    ClassRef { name: String, key: Option<Box<Expr>> },
    /// Lecture d'attribut ; `object` absent = self
    Attribute { object: Option<Box<Expr>>, name: String },
    /// Navigation d'association ; `object` absent = self
    Role { object: Option<Box<Expr>>, role: String },
    Variable(String),
    Literal(Value),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    SetBuilder {
        quantifier: Quantifier,
        var: String,
        entity: String,
        body: Box<Expr>,
    },
}

/// Un nœud : sa forme, son type et son entité de contexte.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<Type>,
    pub entity: Option<EntityRef>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr { kind, ty: None, entity: None }
    }

    /// Fixe le type du nœud
    pub fn typed(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Fixe l'entité de contexte du nœud
    pub fn within(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    // --- Constructeurs courants ---------------------------------------------

    pub fn literal(value: Value) -> Self {
        let ty = value.get_type();
        Expr::new(ExprKind::Literal(value)).typed(ty)
    }

    pub fn boolean(b: bool) -> Self {
        Expr::literal(Value::Boolean(b))
    }

    pub fn var(name: &str) -> Self {
        Expr::new(ExprKind::Variable(name.to_string()))
    }

    /// `object.name`, ou `name` sur self
    pub fn attribute(object: Option<Expr>, name: &str) -> Self {
        Expr::new(ExprKind::Attribute {
            object: object.map(Box::new),
            name: name.to_string(),
        })
    }

    /// `object.role`, ou `role` sur self
    pub fn role(object: Option<Expr>, role: &str) -> Self {
        Expr::new(ExprKind::Role {
            object: object.map(Box::new),
            role: role.to_string(),
        })
    }

    pub fn class_ref(name: &str, key: Option<Expr>) -> Self {
        Expr::new(ExprKind::ClassRef {
            name: name.to_string(),
            key: key.map(Box::new),
        })
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(BinOp::Eq, lhs, rhs)
    }

    pub fn set_builder(quantifier: Quantifier, var: &str, entity: &str, body: Expr) -> Self {
        Expr::new(ExprKind::SetBuilder {
            quantifier,
            var: var.to_string(),
            entity: entity.to_string(),
            body: Box::new(body),
        })
    }

    /// Conjonction gauche à droite ; `true` si la liste est vide.
    ///
    /// Chaque `&` introduit reçoit le type Boolean et l'entité `context`.
    pub fn conjunction(parts: Vec<Expr>, context: &EntityRef) -> Self {
        let mut iter = parts.into_iter();
        let Some(first) = iter.next() else {
            return Expr::boolean(true).within(context.clone());
        };
        iter.fold(first, |acc, next| {
            Expr::binary(BinOp::And, acc, next)
                .typed(Type::Boolean)
                .within(context.clone())
        })
    }

    // --- Lecture --------------------------------------------------------------

    pub fn is_true(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(Value::Boolean(true)))
    }

    /// Les termes d'une conjonction, dans l'ordre
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Binary { op: BinOp::And, lhs, rhs } => {
                let mut out = lhs.conjuncts();
                out.extend(rhs.conjuncts());
                out
            }
            _ => vec![self],
        }
    }

    /// Le nœud et tous ses descendants portent-ils type et entité ?
    pub fn is_resolved(&self) -> bool {
        self.ty.is_some() && self.entity.is_some() && self.children().iter().all(|c| c.is_resolved())
    }

    /// Sous-expressions directes
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::ClassRef { key, .. } => key.iter().map(|k| k.as_ref()).collect(),
            ExprKind::Attribute { object, .. } | ExprKind::Role { object, .. } => {
                object.iter().map(|o| o.as_ref()).collect()
            }
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            ExprKind::SetBuilder { body, .. } => vec![body.as_ref()],
            ExprKind::Variable(_) | ExprKind::Literal(_) => Vec::new(),
        }
    }

    /// Priorité d'affichage : les opérandes d'un binaire moins prioritaire
    /// sont parenthésés.
    fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Binary { op, .. } => op.precedence(),
            _ => u8::MAX,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }

    fn fmt_navigation(object: &Option<Box<Expr>>, name: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(object) = object {
            object.fmt_operand(f, u8::MAX)?;
            write!(f, ".")?;
        }
        write!(f, "{}", name)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::ClassRef { name, key } => {
                write!(f, "{}", name)?;
                if let Some(key) = key {
                    write!(f, "[{}]", key)?;
                }
                Ok(())
            }
            ExprKind::Attribute { object, name } => Expr::fmt_navigation(object, name, f),
            ExprKind::Role { object, role } => Expr::fmt_navigation(object, role, f),
            ExprKind::Variable(name) => write!(f, "{}", name),
            ExprKind::Literal(value) => write!(f, "{}", value),
            ExprKind::Binary { op, lhs, rhs } => {
                // Associatif à gauche : le membre droit de même priorité est parenthésé
                lhs.fmt_operand(f, op.precedence())?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, op.precedence() + 1)
            }
            ExprKind::SetBuilder { quantifier, var, entity, body } => {
                write!(f, "{}{{{} : {} | {}}}", quantifier.keyword(), var, entity, body)
            }
        }
    }
}

// =============================================================================
// Contraintes et cas d'utilisation
// =============================================================================

/// `let name : type_name = expr`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LetBinding {
    pub name: String,
    /// Type tel qu'écrit dans la règle
    pub type_name: String,
    /// Type résolu, une fois connu
    pub ty: Option<Type>,
    pub expr: Expr,
}

/// Origine d'une contrainte dans le cas d'utilisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Phase 1 : création des objets et copie des attributs
    Creation,
    /// Phase 2 : raccordement des associations
    Linking,
    /// Règle venue d'un module externe
    Module,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Creation => write!(f, "phase 1"),
            Phase::Linking => write!(f, "phase 2"),
            Phase::Module => write!(f, "module"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraint {
    /// Nom de l'entité contexte
    pub owner: String,
    /// Entité contexte résolue, une fois connue
    pub owner_ref: Option<EntityRef>,
    pub lets: Vec<LetBinding>,
    pub antecedent: Expr,
    pub succedent: Expr,
    pub phase: Phase,
}

impl Constraint {
    /// Contrainte résolue, construite à partir d'une entité connue
    pub fn new(owner: &EntityRef, lets: Vec<LetBinding>, antecedent: Expr, succedent: Expr, phase: Phase) -> Self {
        Constraint {
            owner: owner.name.clone(),
            owner_ref: Some(owner.clone()),
            lets,
            antecedent,
            succedent,
            phase,
        }
    }

    /// Toutes les expressions de la contrainte sont-elles résolues ?
    pub fn is_resolved(&self) -> bool {
        self.owner_ref.is_some()
            && self.lets.iter().all(|l| l.ty.is_some() && l.expr.is_resolved())
            && self.antecedent.is_resolved()
            && self.succedent.is_resolved()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ::", self.owner)?;
        for binding in &self.lets {
            write!(f, " let {} : {} = {} ;", binding.name, binding.type_name, binding.expr)?;
        }
        write!(f, " {} => {} ;", self.antecedent, self.succedent)
    }
}

/// Un cas d'utilisation : un nom et une suite ordonnée de contraintes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UseCase {
    pub name: String,
    pub constraints: Vec<Constraint>,
}

impl UseCase {
    pub fn new(name: &str) -> Self {
        UseCase { name: name.to_string(), constraints: Vec::new() }
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn by_phase(&self, phase: Phase) -> impl Iterator<Item = &Constraint> + '_ {
        self.constraints.iter().filter(move |c| c.phase == phase)
    }
}

/// Affichage en module de règles, relisible par `rules::parse_module`.
impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        let mut phase = None;
        for constraint in &self.constraints {
            if phase != Some(constraint.phase) {
                writeln!(f, "  -- {}", constraint.phase)?;
                phase = Some(constraint.phase);
            }
            writeln!(f, "  {}", constraint)?;
        }
        write!(f, "end")
    }
}

/// `x.$id = $id` : l'égalité de clé qui rattache un objet cible à sa source.
pub fn key_equality(var: &str, var_entity: &EntityRef, self_entity: &EntityRef) -> Expr {
    let lhs = Expr::attribute(
        Some(Expr::var(var).typed(Type::Entity(var_entity.clone())).within(var_entity.clone())),
        KEY_ATTRIBUTE,
    )
    .typed(Type::String)
    .within(var_entity.clone());
    let rhs = Expr::attribute(None, KEY_ATTRIBUTE)
        .typed(Type::String)
        .within(self_entity.clone());
    Expr::eq(lhs, rhs).typed(Type::Boolean).within(self_entity.clone())
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{EntityId, Side};

    fn order() -> EntityRef {
        EntityRef { side: Side::Source, id: EntityId(0), name: "Order".into() }
    }

    #[test]
    fn test_display_respects_precedence() {
        let sum = Expr::binary(BinOp::Add, Expr::var("a"), Expr::var("b"));
        let prod = Expr::binary(BinOp::Mul, sum.clone(), Expr::var("c"));
        assert_eq!(prod.to_string(), "(a + b) * c");

        let right = Expr::binary(BinOp::Sub, Expr::var("a"), sum);
        assert_eq!(right.to_string(), "a - (a + b)");

        let cmp = Expr::eq(Expr::attribute(Some(Expr::var("x")), "total"), Expr::literal(Value::Real(2.0)));
        assert_eq!(cmp.to_string(), "x.total = 2.0");
    }

    #[test]
    fn test_display_set_builder_and_key_lookup() {
        let body = Expr::eq(
            Expr::role(Some(Expr::var("x")), "customer"),
            Expr::class_ref("Customer", Some(Expr::attribute(Some(Expr::var("c")), "$id"))),
        );
        let e = Expr::set_builder(Quantifier::Exists, "x", "Order", body);
        assert_eq!(e.to_string(), "exists{x : Order | x.customer = Customer[c.$id]}");
    }

    #[test]
    fn test_conjunction() {
        let ctx = order();
        assert!(Expr::conjunction(vec![], &ctx).is_true());
        let c = Expr::conjunction(vec![Expr::var("a"), Expr::var("b"), Expr::var("c")], &ctx);
        assert_eq!(c.to_string(), "a & b & c");
        assert_eq!(c.conjuncts().len(), 3);
    }

    #[test]
    fn test_key_equality_is_resolved() {
        let ctx = order();
        let target = EntityRef { side: Side::Target, id: EntityId(0), name: "OUT$Order".into() };
        let e = key_equality("x", &target, &ctx);
        assert!(e.is_resolved());
        assert_eq!(e.to_string(), "x.$id = $id");
        assert!(!Expr::var("x").is_resolved());
    }

    #[test]
    fn test_constraint_display() {
        let ctx = order();
        let c = Constraint::new(&ctx, vec![], Expr::boolean(true), Expr::var("ok"), Phase::Module);
        assert_eq!(c.to_string(), "Order :: true => ok ;");
        let mut uc = UseCase::new("Copy");
        uc.push(c);
        assert_eq!(uc.by_phase(Phase::Module).count(), 1);
        assert!(uc.to_string().starts_with("module Copy\n"));
    }
}
