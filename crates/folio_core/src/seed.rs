//! Built-in project catalog used to bootstrap an empty gateway.

use crate::model::project::ProjectFields;

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

/// Returns the built-in projects in display order.
pub fn default_projects() -> Vec<ProjectFields> {
    vec![
        ProjectFields {
            title: "Vision Plus Kenya".to_string(),
            description: "An e-commerce website for selling electronic equipment built with \
                WordPress, WooCommerce, and Firebase. Over 2500 people have used it, with 500+ \
                queries being saved and shared, resulting in improved search results."
                .to_string(),
            image: "https://images.unsplash.com/photo-1498049794561-7780e7231661?q=80&w=1470&auto=format&fit=crop".to_string(),
            tags: tags(&["WordPress", "WooCommerce", "Firebase", "E-commerce"]),
            live_url: Some("https://visionplus.co.ke".to_string()),
            github_url: None,
            featured: true,
        },
        ProjectFields {
            title: "PetStore Kenya".to_string(),
            description: "An e-commerce website that sells pet animal products using WordPress \
                and WooCommerce that serves over 300 customers daily."
                .to_string(),
            image: "https://images.unsplash.com/photo-1583337130417-3346a1be7dee?q=80&w=1364&auto=format&fit=crop".to_string(),
            tags: tags(&["WordPress", "WooCommerce", "E-commerce", "Pet Products"]),
            live_url: Some("https://petstorekenya.com".to_string()),
            github_url: None,
            featured: false,
        },
        ProjectFields {
            title: "FarajaRafting".to_string(),
            description: "A team building website that raises funds for cancer patients, built \
                using React.js and related frameworks and technologies."
                .to_string(),
            image: "https://images.unsplash.com/photo-1520853504280-249b72dc947c?q=80&w=1374&auto=format&fit=crop".to_string(),
            tags: tags(&["React.js", "Fundraising", "Team Building", "Healthcare"]),
            live_url: Some("https://farajarafting.org".to_string()),
            github_url: Some("https://github.com/warrenokumu/farajarafting".to_string()),
            featured: false,
        },
        ProjectFields {
            title: "PetStore Kenya App".to_string(),
            description: "A mobile application as a second option for selling animal pet \
                products, built using React Native and related frameworks and technologies."
                .to_string(),
            image: "https://images.unsplash.com/photo-1615751072497-5f5169febe17?q=80&w=1335&auto=format&fit=crop".to_string(),
            tags: tags(&["React Native", "Mobile App", "E-commerce", "Pet Products"]),
            live_url: None,
            github_url: Some("https://github.com/warrenokumu/petstorekenya-app".to_string()),
            featured: false,
        },
    ]
}
