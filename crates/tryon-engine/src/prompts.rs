use tryon_contracts::models::{AvatarStyle, ClothingDetails, MeasurementField, Measurements};

const NOT_PROVIDED: &str = "not provided";

pub fn avatar_prompt(style: AvatarStyle) -> String {
    if style.is_photorealistic() {
        return "Based on the person in this image, create a full-body, photorealistic image of them as if for a professional photoshoot. They should be facing forward with a neutral expression and pose. Place them on a simple, plain light gray background. The final output must be only the image, with no alterations to their appearance other than standardizing the pose and background.".to_string();
    }
    format!(
        "Based on the person in this image, create a full-body {style} avatar. The avatar should be facing forward with a neutral expression and pose. Place the avatar on a simple, plain light gray background. The final output must be only the image."
    )
}

/// `Height: 175 cm, Weight: not provided kg, ...` with a trailing period.
pub fn measurement_summary(measurements: &Measurements) -> String {
    let fields = MeasurementField::ALL
        .iter()
        .map(|field| {
            format!(
                "{}: {} {}",
                field.label(),
                measurements.provided(*field).unwrap_or(NOT_PROVIDED),
                field.unit()
            )
        })
        .collect::<Vec<_>>();
    format!("{}.", fields.join(", "))
}

pub fn try_on_prompt(details: &ClothingDetails, measurements: &Measurements) -> String {
    let measurement_text = measurement_summary(measurements);
    let item_type = details.item_type.trim();
    let material = details.material.trim();
    let fit = details.fit.trim();
    let description = details.description.trim();

    format!(
        r#"You are a globally renowned digital tailor and hyperrealistic fashion artist. Your work is indistinguishable from reality. Your mission is to create a photorealistic virtual try-on image with an obsessive attention to detail.

**Input Images:**
1.  The first image provided is the user's full-body avatar (or photorealistic model).
2.  The subsequent images (up to 4) are of a single clothing item. Use all provided clothing images to understand its complete 3D structure, texture, and design.

**User and Clothing Data:**
-   **User Measurements:** {measurement_text}
-   **Clothing Type:** {item_type}
-   **Clothing Material:** {material}
-   **Intended Fit:** {fit}
-   **Additional Description:** {description}

**Your Instructions:**
1.  **Holistic Garment Analysis:** Analyze all provided clothing images. If you have a front and back view, construct a complete 3D understanding of the garment. Use detail shots to accurately render textures and patterns.
2.  **Hyperrealistic Simulation (Do NOT just paste):** Your primary task is to create a result that is a ditto copy of how the clothing would look if the person were truly wearing it.
    -   **Fit & Measurements:** Critically use the **User Measurements** and the **Intended Fit** ('{fit}'). A 'Slim' fit on the provided measurements must look form-fitting. A 'Loose' fit should have ample room and natural-looking folds.
    -   **Fabric Physics & Realism:** This is paramount. The **Material** ('{material}') is key. Simulate its properties with extreme accuracy. Consider its weight, texture, and sheen. How does light interact with it? How does it fold, crease, and hang? A silk shirt will hang differently than a denim jacket. Show this through photorealistic highlights, shadows, and wrinkle patterns. The result must be indistinguishable from a real photograph.
    -   **Preserve Identity:** The avatar's proportions, pose, style, and face must remain identical. The background must also remain unchanged from the original avatar image—a simple, plain light gray.
3. **Critical Thinking Process (Internal Monologue):** Before generating the final image, first, think step-by-step. 1. Analyze the avatar's body shape from the measurements. 2. Analyze the garment's 3D shape from all images. 3. Mentally drape the garment onto the avatar. How does the '{material}' fabric hang and fold? Where would shadows naturally fall? Where would there be tension or slack based on the '{fit}' fit? 4. Now, based on that detailed mental model, render the final, photorealistic image.
4.  **Output:** Your final output must be **only the resulting image** of the avatar wearing the clothing. Do not include any text, explanations, or borders."#
    )
}

#[cfg(test)]
mod tests {
    use tryon_contracts::models::{AvatarStyle, ClothingDetails, Measurements};

    use super::{avatar_prompt, measurement_summary, try_on_prompt};

    #[test]
    fn stylized_prompt_names_the_style() {
        let prompt = avatar_prompt(AvatarStyle::Anime);
        assert!(prompt.contains("full-body Anime avatar"));
        assert!(!prompt.contains("photorealistic"));
        assert!(prompt.contains("plain light gray background"));

        assert!(avatar_prompt(AvatarStyle::PixelArt).contains("full-body Pixel Art avatar"));
    }

    #[test]
    fn hyperrealistic_prompt_uses_photoshoot_wording() {
        let prompt = avatar_prompt(AvatarStyle::Hyperrealistic);
        assert!(prompt.contains("photorealistic image of them"));
        assert!(!prompt.contains("avatar"));
        assert!(prompt.contains("only the image"));
    }

    #[test]
    fn measurement_summary_marks_missing_fields() {
        let measurements = Measurements {
            height: "180".to_string(),
            waist: "82".to_string(),
            ..Measurements::default()
        };
        assert_eq!(
            measurement_summary(&measurements),
            "Height: 180 cm, Weight: not provided kg, Chest: not provided cm, Waist: 82 cm, Hips: not provided cm."
        );
    }

    #[test]
    fn try_on_prompt_embeds_details_and_directives() {
        let details = ClothingDetails {
            item_type: "Jacket".to_string(),
            material: "Denim".to_string(),
            fit: "Oversized".to_string(),
            description: "distressed".to_string(),
        };
        let prompt = try_on_prompt(&details, &Measurements::default());
        assert!(prompt.contains("**Clothing Type:** Jacket"));
        assert!(prompt.contains("**Clothing Material:** Denim"));
        assert!(prompt.contains("**Intended Fit:** Oversized"));
        assert!(prompt.contains("**Additional Description:** distressed"));
        assert!(prompt.contains("How does the 'Denim' fabric hang and fold?"));
        assert!(prompt.contains("Height: not provided cm"));
        assert!(prompt.contains("**only the resulting image**"));
    }
}
