//! Prompts sent to the vision capability.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the transcript parser in
//!    [`crate::pipeline::transcript`] depends on the exact section headers
//!    the prompt demands (`TYPE_DOCUMENT:`, `INFORMATIONS_EXTRAITES:`, …);
//!    keeping prompt and parser expectations in one crate prevents drift.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live capability call.
//!
//! The wire format is French: the documents are French-language
//! administrative paperwork and the structured layout (`TYPE_DOCUMENT`,
//! `QUALITE_IMAGE`, sentinel markers `ILLISIBLE` / `PARTIEL` / `INCERTAIN`)
//! is what the models were observed to follow most reliably. Callers can
//! override both prompts via [`crate::config::AnalysisConfig`]; any override
//! must keep the same response layout.

/// Default classification + extraction prompt.
///
/// Asks the model to (a) classify the document, (b) extract a fixed field
/// set conditioned on the type, (c) mark unreadable fields with sentinel
/// markers instead of guessing, and (d) answer in the structured text layout
/// the parser expects.
pub const EXTRACTION_PROMPT: &str = r#"Tu es un expert en extraction d'informations de documents administratifs.

**ETAPE 1 - CLASSIFICATION DU DOCUMENT**
Identifie le type de document parmi :
- CIN (Carte d'Identite Nationale)
- PASSEPORT
- FACTURE_ELECTRICITE
- BULLETIN_SALAIRE
- RELEVE_BANCAIRE
- JUSTIFICATIF_DOMICILE (autre que facture electricite)
- AUTRE (specifie lequel)

**ETAPE 2 - EXTRACTION CIBLEE PAR TYPE**

Si CIN :
- numero_cin: [numero]
- nom_complet: [nom]
- prenom: [prenom]
- date_naissance: [JJ/MM/AAAA]
- lieu_naissance: [ville]
- adresse_complete: [adresse]
- date_emission: [JJ/MM/AAAA]
- date_expiration: [JJ/MM/AAAA]

Si PASSEPORT :
- numero_passeport: [numero]
- nom_complet: [nom]
- prenom: [prenom]
- date_naissance: [JJ/MM/AAAA]
- nationalite: [nationalite]
- date_emission: [JJ/MM/AAAA]
- date_expiration: [JJ/MM/AAAA]

Si FACTURE_ELECTRICITE :
- fournisseur: [nom fournisseur]
- numero_client: [numero abonne]
- nom_titulaire: [nom]
- adresse_facturation: [adresse]
- montant_a_payer: [montant]
- date_emission: [JJ/MM/AAAA]

Si BULLETIN_SALAIRE :
- nom_employe: [nom]
- prenom_employe: [prenom]
- entreprise: [nom employeur]
- numero_cnss: [numero]
- salaire_net: [montant]
- periode: [MM/AAAA]
- date_emission: [JJ/MM/AAAA]

Si RELEVE_BANCAIRE :
- banque: [nom banque]
- nom_titulaire: [nom]
- numero_compte: [RIB/numero]
- solde_final: [montant]
- date_emission: [JJ/MM/AAAA]

**ETAPE 3 - GESTION DES CAS DIFFICILES**
- Si un champ est illisible : marque "ILLISIBLE"
- Si un champ est partiellement visible : marque "PARTIEL: [ce qui est visible]"
- Si incertain sur une valeur : marque "INCERTAIN: [valeur probable]"

**FORMAT DE REPONSE OBLIGATOIRE :**
TYPE_DOCUMENT: [type identifie]
CONFIANCE_CLASSIFICATION: [HAUTE/MOYENNE/FAIBLE]
QUALITE_IMAGE: [BONNE/MOYENNE/FAIBLE]

INFORMATIONS_EXTRAITES:
- nom_complet: [valeur]
- prenom: [valeur]
- [autres champs selon le type...]

OBSERVATIONS:
- [Notes sur la qualite, problemes detectes]

**REGLES IMPORTANTES :**
1. Privilegie la precision sur la quantite - mieux vaut marquer ILLISIBLE que deviner
2. Normalise les formats de date en JJ/MM/AAAA
3. Pour les montants, indique l'unite
4. Pour les adresses, extrais l'adresse complete

Analyse maintenant ce document :"#;

/// Recovery prompt for low-quality scans: second, degraded attempt asking
/// only for the critical fields, accepting best-effort answers. The forced
/// `QUALITE_IMAGE: FAIBLE` keeps the merged record honest about its source.
pub const RECOVERY_PROMPT: &str = r#"Ce document semble de mauvaise qualite. Mode recuperation active :

1. Identifie les zones de texte les plus lisibles
2. Concentre-toi sur les informations critiques : nom, prenom, numeros
3. Utilise le contexte visuel (logos, mise en page) pour le type de document

**FORMAT DE REPONSE :**
TYPE_DOCUMENT: [type probable]
CONFIANCE_CLASSIFICATION: FAIBLE
QUALITE_IMAGE: FAIBLE

INFORMATIONS_EXTRAITES:
- nom_complet: [valeur si lisible sinon ILLISIBLE]
- prenom: [valeur si lisible sinon ILLISIBLE]
- [autres champs critiques...]

OBSERVATIONS:
- Document de tres mauvaise qualite"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_demands_the_parsed_headers() {
        for header in [
            "TYPE_DOCUMENT:",
            "CONFIANCE_CLASSIFICATION:",
            "QUALITE_IMAGE:",
            "INFORMATIONS_EXTRAITES:",
            "OBSERVATIONS:",
        ] {
            assert!(
                EXTRACTION_PROMPT.contains(header),
                "missing header {header}"
            );
        }
    }

    #[test]
    fn prompts_name_the_sentinel_markers() {
        assert!(EXTRACTION_PROMPT.contains("ILLISIBLE"));
        assert!(EXTRACTION_PROMPT.contains("PARTIEL"));
        assert!(EXTRACTION_PROMPT.contains("INCERTAIN"));
        assert!(RECOVERY_PROMPT.contains("ILLISIBLE"));
    }

    #[test]
    fn recovery_prompt_forces_poor_image_quality() {
        assert!(RECOVERY_PROMPT.contains("QUALITE_IMAGE: FAIBLE"));
    }
}
