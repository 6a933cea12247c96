//! typed parameter registry
//!
//! Parameter names follow `<role>_<kind>_<id>` or `<role>_<kind>_<id>_<slot>`, for example
//! `kon_TF_Spi1`, `alpha1_TG_Gata1_2`, `K3_TG_Klf1`. The registry enumerates every name a branch
//! needs once, in canonical order (kind, id, role, slot), and maps names to dense indices so the
//! objective never formats or hashes strings while iterating.
use crate::model::data::TrainingData;
use crate::model::errors::{FitError, FitResult};
use itertools::Itertools;
use log::warn;
use nalgebra::DVector;
use std::collections::HashMap;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
pub enum EntityKind {
    TF,
    TG,
}

/// parameter role; declaration order is the canonical order inside one entity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString,
)]
pub enum Role {
    #[strum(serialize = "kon")]
    RateOn,
    #[strum(serialize = "koff")]
    RateOff,
    #[strum(serialize = "alpha1")]
    Alpha1,
    #[strum(serialize = "alpha2")]
    Alpha2,
    #[strum(serialize = "beta1")]
    Beta1,
    #[strum(serialize = "beta2")]
    Beta2,
    #[strum(serialize = "beta3")]
    Beta3,
    #[strum(serialize = "tilde")]
    Tilde,
    #[strum(serialize = "w1")]
    Weight1,
    #[strum(serialize = "w2")]
    Weight2,
    #[strum(serialize = "w3")]
    Weight3,
    #[strum(serialize = "K1")]
    HillK1,
    #[strum(serialize = "K2")]
    HillK2,
    #[strum(serialize = "K3")]
    HillK3,
    #[strum(serialize = "K4")]
    HillK4,
    #[strum(serialize = "K5")]
    HillK5,
    #[strum(serialize = "K6")]
    HillK6,
    #[strum(serialize = "n1")]
    HillN1,
    #[strum(serialize = "n2")]
    HillN2,
    #[strum(serialize = "n3")]
    HillN3,
    #[strum(serialize = "n4")]
    HillN4,
    #[strum(serialize = "n5")]
    HillN5,
    #[strum(serialize = "n6")]
    HillN6,
}

impl Role {
    /// present for both a TF copy and a TG copy, combined by arithmetic mean
    pub fn is_shared(&self) -> bool {
        matches!(
            self,
            Role::RateOn
                | Role::RateOff
                | Role::Alpha1
                | Role::Alpha2
                | Role::Beta1
                | Role::Beta2
                | Role::Beta3
        )
    }

    /// indexed by time slot 1..=L-1
    pub fn is_series(&self) -> bool {
        matches!(
            self,
            Role::Alpha1 | Role::Alpha2 | Role::Beta1 | Role::Beta2 | Role::Beta3 | Role::Tilde
        )
    }

    pub fn applies_to(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::TF => self.is_shared() || *self == Role::Tilde,
            EntityKind::TG => true,
        }
    }

    /// (dissociation constant, Hill coefficient) roles of the six saturation transforms
    pub const HILL_PAIRS: [(Role, Role); 6] = [
        (Role::HillK1, Role::HillN1),
        (Role::HillK2, Role::HillN2),
        (Role::HillK3, Role::HillN3),
        (Role::HillK4, Role::HillN4),
        (Role::HillK5, Role::HillN5),
        (Role::HillK6, Role::HillN6),
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    pub role: Role,
    pub kind: EntityKind,
    pub id: String,
    /// 1-based time slot for series roles
    pub slot: Option<usize>,
}

impl ParamKey {
    pub fn new(role: Role, kind: EntityKind, id: &str, slot: Option<usize>) -> Self {
        ParamKey {
            role,
            kind,
            id: id.to_string(),
            slot,
        }
    }

    pub fn name(&self) -> String {
        match self.slot {
            Some(slot) => format!("{}_{}_{}_{}", self.role, self.kind, self.id, slot),
            None => format!("{}_{}_{}", self.role, self.kind, self.id),
        }
    }

    pub fn parse(name: &str) -> FitResult<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        let bad = || FitError::InvalidInput(format!("malformed parameter name '{}'", name));
        if parts.len() != 3 && parts.len() != 4 {
            return Err(bad());
        }
        let role = Role::from_str(parts[0]).map_err(|_| bad())?;
        let kind = EntityKind::from_str(parts[1]).map_err(|_| bad())?;
        if parts[2].is_empty() || !role.applies_to(kind) {
            return Err(bad());
        }
        let slot = match parts.get(3) {
            Some(s) => Some(s.parse::<usize>().map_err(|_| bad())?),
            None => None,
        };
        if slot.is_some() != role.is_series() || slot == Some(0) {
            return Err(bad());
        }
        Ok(ParamKey::new(role, kind, parts[2], slot))
    }
}

/// parameter vector together with its names
#[derive(Debug, Clone, PartialEq)]
pub struct NamedVector {
    pub names: Vec<String>,
    pub values: DVector<f64>,
}

impl NamedVector {
    pub fn new(names: Vec<String>, values: DVector<f64>) -> FitResult<Self> {
        if names.len() != values.len() {
            return Err(FitError::InvalidInput(format!(
                "{} names for {} values",
                names.len(),
                values.len()
            )));
        }
        Ok(NamedVector { names, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn to_map(&self) -> HashMap<String, f64> {
        self.names
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(|n| n.as_str())
            .zip(self.values.iter().cloned())
    }
}

#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    keys: Vec<ParamKey>,
    names: Vec<String>,
    index: HashMap<String, usize>,
    n_slots: usize,
}

impl ParameterRegistry {
    /// enumerate every parameter of the branch described by `data`
    pub fn from_data(data: &TrainingData) -> Self {
        let n_slots = data.n_slots();
        let mut keys = Vec::new();
        for (kind, ids) in [
            (EntityKind::TF, data.tf_ids()),
            (EntityKind::TG, data.tg_ids()),
        ] {
            for id in ids.iter() {
                for role in Role::iter().filter(|r| r.applies_to(kind)) {
                    if role.is_series() {
                        for slot in 1..=n_slots {
                            keys.push(ParamKey::new(role, kind, id, Some(slot)));
                        }
                    } else {
                        keys.push(ParamKey::new(role, kind, id, None));
                    }
                }
            }
        }
        let names: Vec<String> = keys.iter().map(|k| k.name()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        ParameterRegistry {
            keys,
            names,
            index,
            n_slots,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn n_slots(&self) -> usize {
        self.n_slots
    }

    pub fn keys(&self) -> &[ParamKey] {
        &self.keys
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> FitResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| FitError::MissingParameterKey {
                name: name.to_string(),
            })
    }

    pub fn index(
        &self,
        role: Role,
        kind: EntityKind,
        id: &str,
        slot: Option<usize>,
    ) -> FitResult<usize> {
        self.index_of(&ParamKey::new(role, kind, id, slot).name())
    }

    /// dense vector in registry order from a name -> value map; every registry name is required
    pub fn vector_from_map(&self, values: &HashMap<String, f64>) -> FitResult<DVector<f64>> {
        let mut out = DVector::zeros(self.len());
        for (i, name) in self.names.iter().enumerate() {
            out[i] = *values
                .get(name)
                .ok_or_else(|| FitError::MissingParameterKey { name: name.clone() })?;
        }
        if values.len() > self.len() {
            let extra = values
                .keys()
                .filter(|k| !self.index.contains_key(*k))
                .sorted()
                .take(5)
                .join(", ");
            warn!(
                "{} names are not used by this branch and are ignored (e.g. {})",
                values.len() - self.len(),
                extra
            );
        }
        Ok(out)
    }

    pub fn named(&self, values: &DVector<f64>) -> FitResult<NamedVector> {
        NamedVector::new(self.names.clone(), values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::data::PairSeries;

    fn two_pair_data() -> TrainingData {
        let s = vec![1.0, 2.0, 1.5];
        TrainingData::new(vec![
            PairSeries::new("B1_Gata1~Spi1_1", 0.8, s.clone(), s.clone(), s.clone()).unwrap(),
            PairSeries::new("B1_Klf1~Spi1_2", 0.3, s.clone(), s.clone(), s.clone()).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_role_names_round_trip() {
        for role in Role::iter() {
            assert_eq!(Role::from_str(&role.to_string()).unwrap(), role);
        }
        assert_eq!(Role::HillK3.to_string(), "K3");
        assert_eq!(Role::RateOff.to_string(), "koff");
    }

    #[test]
    fn test_param_key_parse() {
        let key = ParamKey::parse("alpha1_TG_Gata1_2").unwrap();
        assert_eq!(key, ParamKey::new(Role::Alpha1, EntityKind::TG, "Gata1", Some(2)));
        assert_eq!(key.name(), "alpha1_TG_Gata1_2");
        assert_eq!(
            ParamKey::parse("kon_TF_Spi1").unwrap(),
            ParamKey::new(Role::RateOn, EntityKind::TF, "Spi1", None)
        );
        // TG-only role on a TF, missing slot, slot on scalar, zero slot
        assert!(ParamKey::parse("w1_TF_Spi1").is_err());
        assert!(ParamKey::parse("beta1_TF_Spi1").is_err());
        assert!(ParamKey::parse("kon_TF_Spi1_1").is_err());
        assert!(ParamKey::parse("tilde_TG_Gata1_0").is_err());
        assert!(ParamKey::parse("gamma_TG_Gata1").is_err());
    }

    #[test]
    fn test_registry_layout() {
        let registry = ParameterRegistry::from_data(&two_pair_data());
        // TF: kon, koff + 5 shared series + tilde series, 2 slots -> 2 + 6*2 = 14
        // TG: 14 + w1..w3 + K1..K6 + n1..n6 = 29, two TGs
        assert_eq!(registry.len(), 14 + 2 * 29);
        assert_eq!(registry.n_slots(), 2);
        assert_eq!(registry.names()[0], "kon_TF_Spi1");
        assert_eq!(registry.names()[2], "alpha1_TF_Spi1_1");
        assert_eq!(registry.names()[14], "kon_TG_Gata1");
        assert_eq!(registry.names()[registry.len() - 1], "n6_TG_Klf1");
        let i = registry
            .index(Role::Beta3, EntityKind::TG, "Klf1", Some(2))
            .unwrap();
        assert_eq!(registry.names()[i], "beta3_TG_Klf1_2");
        assert!(matches!(
            registry.index_of("kon_TF_Gata1"),
            Err(FitError::MissingParameterKey { .. })
        ));
    }

    #[test]
    fn test_vector_from_map_requires_every_name() {
        let registry = ParameterRegistry::from_data(&two_pair_data());
        let mut map: HashMap<String, f64> = registry
            .names()
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i as f64))
            .collect();
        let v = registry.vector_from_map(&map).unwrap();
        assert_eq!(v[5], 5.0);
        map.remove("K2_TG_Gata1");
        assert_eq!(
            registry.vector_from_map(&map),
            Err(FitError::MissingParameterKey {
                name: "K2_TG_Gata1".to_string()
            })
        );
    }

    #[test]
    fn test_named_vector() {
        let nv = NamedVector::new(
            vec!["a".to_string(), "b".to_string()],
            DVector::from_vec(vec![1.0, 2.0]),
        )
        .unwrap();
        assert_eq!(nv.get("b"), Some(2.0));
        assert_eq!(nv.get("c"), None);
        assert_eq!(nv.to_map().len(), 2);
        assert!(NamedVector::new(vec!["a".to_string()], DVector::zeros(2)).is_err());
    }
}
