//! User-facing text for recommendations: explanation prompts and the
//! sentences used when generation or metadata lookups fail.

use crate::models::{Category, Locale, ParticipantPreferences};

pub fn category_label(category: Category, locale: Locale) -> &'static str {
    match (locale, category) {
        (Locale::En, Category::Film) => "film",
        (Locale::En, Category::Book) => "book",
        (Locale::En, Category::TvShow) => "TV show",
        (Locale::Fr, Category::Film) => "film",
        (Locale::Fr, Category::Book) => "livre",
        (Locale::Fr, Category::TvShow) => "série",
    }
}

fn list_heading(category: Category, locale: Locale) -> &'static str {
    match (locale, category) {
        (Locale::En, Category::Film) => "Movies",
        (Locale::En, Category::Book) => "Books",
        (Locale::En, Category::TvShow) => "TV Shows",
        (Locale::Fr, Category::Film) => "Films",
        (Locale::Fr, Category::Book) => "Livres",
        (Locale::Fr, Category::TvShow) => "Séries",
    }
}

/// One block per participant listing their favorite titles by category
///
/// ```text
/// * Alice likes:
///   - Movies: Dune, Arrival
/// ```
pub fn format_preferences(participants: &[ParticipantPreferences], locale: Locale) -> String {
    let likes = match locale {
        Locale::En => "likes",
        Locale::Fr => "aime",
    };

    participants
        .iter()
        .map(|participant| {
            let lists: Vec<String> = [Category::Film, Category::Book, Category::TvShow]
                .into_iter()
                .filter_map(|category| {
                    let titles: Vec<&str> = participant
                        .favorites(category)
                        .iter()
                        .map(|work| work.title.as_str())
                        .collect();
                    if titles.is_empty() {
                        None
                    } else {
                        Some(format!(
                            "  - {}: {}",
                            list_heading(category, locale),
                            titles.join(", ")
                        ))
                    }
                })
                .collect();

            format!("* {} {}:\n{}", participant.name, likes, lists.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt asking the model why `title` suits the group
pub fn explanation_prompt(
    title: &str,
    category: Category,
    participants: &[ParticipantPreferences],
    locale: Locale,
) -> String {
    let label = category_label(category, locale);
    let preferences = format_preferences(participants, locale);

    match locale {
        Locale::En => format!(
            r#"You are Kurius, a cultural expert. Write a short and impactful explanation (3-4 sentences maximum in total) of why this work is an excellent recommendation for this group.

---
**Recommended work:** "{title}" (Category: {label})
**Participants and their tastes:**
{preferences}
---

**STRICT instructions:**
1. **Direct analysis:** Explain in 2-3 points (each starting with "-") why "{title}" will appeal.
2. **Relevant connection:** Find a common theme, atmosphere or narrative structure between a participant's tastes and the recommended work.
3. **Factual and verifiable:** Base every argument on real, verifiable elements of "{title}".
4. **Do not transfer:** Never attribute characteristics of the participants' favorite works to the recommended work when they do not apply.
5. **Brief conclusion:** End with a simple, warm sentence.
6. **No title, no long introduction.** Get straight to the point."#
        ),
        Locale::Fr => format!(
            r#"Tu es Kurius, un expert culturel. Rédige une explication courte et percutante (3-4 phrases maximum au total) expliquant pourquoi cette œuvre est une excellente recommandation pour ce groupe.

---
**Œuvre recommandée :** "{title}" (Catégorie : {label})
**Participants et leurs goûts :**
{preferences}
---

**Instructions STRICTES :**
1. **Analyse directe :** Explique en 2-3 points (commençant chacun par "-") pourquoi "{title}" va plaire.
2. **Connexion pertinente :** Trouve un thème commun, une ambiance ou une structure narrative similaire entre les goûts d'un participant et l'œuvre recommandée.
3. **Factuel et vérifiable :** Base chaque argument sur des éléments réels et vérifiables de "{title}".
4. **Interdiction de transférer :** N'attribue jamais à l'œuvre recommandée des caractéristiques des œuvres préférées des participants si elles ne s'appliquent pas.
5. **Conclusion brève :** Termine par une phrase simple et chaleureuse.
6. **Pas de titre, pas d'introduction longue.** Va droit au but."#
        ),
    }
}

/// Sentence used when the explanation could not be generated
pub fn fallback_explanation(participant_names: &[String], locale: Locale) -> String {
    match locale {
        Locale::En => format!(
            "This work promises beautiful sharing moments for {}!",
            participant_names.join(" and ")
        ),
        Locale::Fr => format!(
            "Cette œuvre promet de beaux moments de partage pour {} !",
            participant_names.join(" et ")
        ),
    }
}

/// Description used when no metadata was found
pub fn generic_description(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "A great pick for the group.",
        Locale::Fr => "Une excellente suggestion pour le groupe.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FavoriteWork;

    fn favorite(title: &str) -> FavoriteWork {
        FavoriteWork {
            id: title.to_lowercase(),
            title: title.to_string(),
            poster_path: None,
            taste_graph_id: None,
            authors: Vec::new(),
            categories: Vec::new(),
            metadata: None,
        }
    }

    fn participants() -> Vec<ParticipantPreferences> {
        vec![
            ParticipantPreferences {
                name: "Alice".to_string(),
                films: vec![favorite("Dune"), favorite("Arrival")],
                books: Vec::new(),
                tv_shows: vec![favorite("Arcane")],
            },
            ParticipantPreferences {
                name: "Bob".to_string(),
                films: Vec::new(),
                books: vec![favorite("1984")],
                tv_shows: Vec::new(),
            },
        ]
    }

    #[test]
    fn test_format_preferences_skips_empty_lists() {
        let text = format_preferences(&participants(), Locale::En);
        assert_eq!(
            text,
            "* Alice likes:\n  - Movies: Dune, Arrival\n  - TV Shows: Arcane\n\n* Bob likes:\n  - Books: 1984"
        );
    }

    #[test]
    fn test_format_preferences_in_french() {
        let text = format_preferences(&participants(), Locale::Fr);
        assert!(text.starts_with("* Alice aime:\n  - Films: Dune, Arrival\n  - Séries: Arcane"));
        assert!(text.contains("  - Livres: 1984"));
    }

    #[test]
    fn test_explanation_prompt_names_the_work() {
        let prompt = explanation_prompt("Interstellar", Category::Film, &participants(), Locale::En);
        assert!(prompt.contains(r#""Interstellar" (Category: film)"#));
        assert!(prompt.contains("* Alice likes:"));

        let prompt = explanation_prompt("Fleabag", Category::TvShow, &participants(), Locale::Fr);
        assert!(prompt.contains(r#""Fleabag" (Catégorie : série)"#));
        assert!(prompt.starts_with("Tu es Kurius"));
    }

    #[test]
    fn test_fallback_explanation() {
        let names = vec!["A".to_string(), "B".to_string()];
        assert_eq!(
            fallback_explanation(&names, Locale::En),
            "This work promises beautiful sharing moments for A and B!"
        );
        assert_eq!(
            fallback_explanation(&names, Locale::Fr),
            "Cette œuvre promet de beaux moments de partage pour A et B !"
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(category_label(Category::TvShow, Locale::En), "TV show");
        assert_eq!(category_label(Category::Book, Locale::Fr), "livre");
        assert_eq!(generic_description(Locale::Fr), "Une excellente suggestion pour le groupe.");
    }
}
